//! Generic configuration loader for loading items from a YAML file.

use std::{fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::Target;

/// A generic loader for YAML files.
pub struct ConfigLoader {
    path: PathBuf,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file could not be read.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file could not be parsed or lacks the expected key.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The file is not YAML.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the list of items stored under the top-level `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let config_str = fs::read_to_string(&self.path)?;

        let config = Config::builder()
            .add_source(File::from_str(&config_str, FileFormat::Yaml))
            .build()?;

        let items = config.get(key)?;

        Ok(items)
    }

    fn is_yaml_file(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
    }
}

/// Loads the targets listed under the `targets` key of a YAML file.
pub fn load_targets(path: impl Into<PathBuf>) -> Result<Vec<Target>, LoaderError> {
    let path = path.into();
    tracing::debug!(path = %path.display(), "Loading targets...");
    let targets: Vec<Target> = ConfigLoader::new(path).load("targets")?;
    tracing::info!(count = targets.len(), "Targets loaded.");
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
        let path = dir.path().join(filename);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_load_targets() {
        let dir = TempDir::new().unwrap();
        let content = r#"
targets:
  - url: "https://example.com/appointments"
    name: "Appointments"
    terms: ["appointment", "available"]
    extract:
      date: 'Date:\s*(\d{4}-\d{2}-\d{2})'
  - url: "https://example.org/status"
    terms: ["open"]
"#;
        let path = create_test_file(&dir, "targets.yaml", content);

        let targets = load_targets(path).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].display_name(), "Appointments");
        assert_eq!(targets[0].terms, vec!["appointment".to_string(), "available".to_string()]);
        assert_eq!(targets[0].extract.len(), 1);
        assert!(targets[0].extract.contains_key("date"));
        assert_eq!(targets[1].name, None);
        assert_eq!(targets[1].id(), "https://example.org/status");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(dir.path().join("nonexistent.yaml"));
        let result: Result<Vec<Target>, _> = loader.load("targets");

        assert!(matches!(result.unwrap_err(), LoaderError::IoError(_)));
    }

    #[test]
    fn test_load_invalid_yaml_syntax() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "invalid.yaml", "targets: [ { url: 'https://a.example'");
        let result: Result<Vec<Target>, _> = ConfigLoader::new(path).load("targets");

        assert!(matches!(result.unwrap_err(), LoaderError::ParseError(_)));
    }

    #[test]
    fn test_load_invalid_url() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "targets.yaml", "targets:\n  - url: 'not a url'\n");

        assert!(matches!(load_targets(path).unwrap_err(), LoaderError::ParseError(_)));
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "targets.txt", "targets: []");
        let result: Result<Vec<Target>, _> = ConfigLoader::new(path).load("targets");

        assert!(matches!(result.unwrap_err(), LoaderError::UnsupportedFormat));
    }

    #[test]
    fn test_load_missing_top_level_key() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "targets.yaml", "monitors:\n  - url: 'https://a.example'\n");
        let result: Result<Vec<Target>, _> = ConfigLoader::new(path).load("targets");

        assert!(matches!(result.unwrap_err(), LoaderError::ParseError(_)));
    }
}
