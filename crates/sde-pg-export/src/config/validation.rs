//! Configuration validation.

use super::Config;
use crate::error::{ExportError, Result};
use crate::target::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(ExportError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(ExportError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(ExportError::Config("source.user is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(ExportError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(ExportError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(ExportError::Config("target.user is required".into()));
    }
    config.target.ssl_mode.parse::<SslMode>()?;

    // Cannot export into the database we read from
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(ExportError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    if config.export.buffer_size == 0 {
        return Err(ExportError::Config(
            "export.buffer_size must be at least 1".into(),
        ));
    }
    if let Some(srid) = config.export.srid {
        if srid <= 0 {
            return Err(ExportError::Config(format!(
                "export.srid must be positive, got {}",
                srid
            )));
        }
    }
    if config.export.prefetch_rows == 0 {
        return Err(ExportError::Config(
            "export.prefetch_rows must be at least 1".into(),
        ));
    }

    Ok(())
}
