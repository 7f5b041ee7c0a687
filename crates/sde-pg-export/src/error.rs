//! Error types for the export library.

use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, missing fields, no geometry column, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Either endpoint unreachable or credentials rejected
    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// DDL execution failed (e.g. destination table already exists)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column value could not be converted for the destination
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Malformed well-known-binary geometry
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Insert or commit failed on the destination
    #[error("Write failed for table {table}: {message}")]
    Write { table: String, message: String },

    /// Source cursor failed while streaming rows
    #[error("Source read failed: {0}")]
    Read(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export was cancelled (SIGINT, etc.)
    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    /// Create a Connection error for the given endpoint.
    pub fn connection(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ExportError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error
    pub fn write(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ExportError::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error belongs to the conversion family (bad value or bad WKB).
    pub fn is_conversion(&self) -> bool {
        matches!(self, ExportError::Conversion(_) | ExportError::Geometry(_))
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) | ExportError::Yaml(_) => 1,
            ExportError::Connection { .. } => 2,
            ExportError::Schema(_) => 3,
            ExportError::Conversion(_) | ExportError::Geometry(_) => 4,
            ExportError::Write { .. } | ExportError::Read(_) => 5,
            ExportError::Json(_) => 6,
            ExportError::Io(_) => 7,
            ExportError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
