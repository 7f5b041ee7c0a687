//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl SourceConfig {
    /// Short `host:port/database` label for logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl TargetConfig {
    /// Short `host:port/database` label for logs and errors.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
source:
  host: sde.example.org
  database: gis
  user: sde
  password: secret
  schema: sde
target:
  host: pg.example.org
  database: postgis
  user: loader
  password: secret
  ssl_mode: disable
export:
  buffer_size: 500
  srid: 3006
  spatial_type: detect
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.port, 1433);
        assert_eq!(config.target.port, 5432);
        assert!(config.source.encrypt);
        assert_eq!(config.export.buffer_size, 500);
        assert_eq!(config.export.srid, Some(3006));
        assert_eq!(config.export.spatial_type, SpatialTypeStrategy::Detect);
        assert_eq!(config.export.prefetch_rows, 256);
    }

    #[test]
    fn test_export_section_optional() {
        let yaml = r#"
source: { host: a, database: gis, user: sde }
target: { host: b, database: postgis, user: loader, ssl_mode: disable }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.export.buffer_size, 1000);
        assert_eq!(config.export.srid, None);
        assert_eq!(config.export.spatial_type, SpatialTypeStrategy::Generic);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.target.endpoint(), "pg.example.org:5432/postgis");
    }

    #[test]
    fn test_invalid_yaml_is_yaml_error() {
        let err = Config::from_yaml("source: [").unwrap_err();
        assert!(matches!(err, crate::error::ExportError::Yaml(_)));
    }
}
