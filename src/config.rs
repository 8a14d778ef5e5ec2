//! Configuration types for frameseq

use crate::grammar::FilenameParser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for sequence detection and file operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Multi-part extensions consumed whole by the filename parser
    pub compound_extensions: Vec<String>,

    /// Extensions of single-file media reported separately by directory scans
    pub movie_extensions: Vec<String>,

    /// Create missing target directories when moving or copying
    pub create_directories: bool,

    /// Overwrite conflicting destinations when executing a plan
    pub force: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compound_extensions: vec!["tar.gz".into(), "tar.bz2".into(), "log.gz".into()],
            movie_extensions: vec![
                "mov".into(),
                "mp4".into(),
                "avi".into(),
                "mkv".into(),
                "m4v".into(),
                "mxf".into(),
            ],
            create_directories: false,
            force: false,
        }
    }
}

impl Config {
    /// Check if a file extension is on the movie allow-list
    pub fn is_movie(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.movie_extensions
            .iter()
            .any(|e| e.to_lowercase() == ext_lower)
    }

    /// Build a filename parser honouring the configured compound extensions
    pub fn parser(&self) -> FilenameParser {
        FilenameParser::with_compound_extensions(self.compound_extensions.iter().cloned())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            source: e,
        })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# frameseq configuration file
# This file uses TOML format (https://toml.io)

# Multi-part extensions that are kept whole when splitting a filename.
# "render.0001.tar.gz" parses with extension "tar.gz" instead of "gz".
compound_extensions = ["tar.gz", "tar.bz2", "log.gz"]

# Single-file media that directory scans list separately instead of
# treating as rogue files
movie_extensions = ["mov", "mp4", "avi", "mkv", "m4v", "mxf"]

# Create missing target directories when moving or copying sequences
create_directories = false

# Overwrite existing destination files when executing a plan
force = false
"#
        .to_string()
    }
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to write configuration file
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to serialize configuration
    SerializeError {
        source: toml::ser::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
            ConfigError::WriteError { path, source } => {
                write!(f, "Failed to write config file '{}': {}", path.display(), source)
            }
            ConfigError::SerializeError { source } => {
                write!(f, "Failed to serialize config: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::WriteError { source, .. } => Some(source),
            ConfigError::SerializeError { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sample_config_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        let default = Config::default();
        assert_eq!(config.compound_extensions, default.compound_extensions);
        assert_eq!(config.movie_extensions, default.movie_extensions);
        assert!(!config.create_directories);
        assert!(!config.force);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("frameseq.toml");

        let mut config = Config::default();
        config.compound_extensions.push("tar.xz".into());
        config.force = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert!(loaded.compound_extensions.contains(&"tar.xz".to_string()));
        assert!(loaded.force);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("force = true\n").unwrap();
        assert!(config.force);
        assert_eq!(config.compound_extensions.len(), 3);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn test_is_movie_case_insensitive() {
        let config = Config::default();
        assert!(config.is_movie("MOV"));
        assert!(config.is_movie("mp4"));
        assert!(!config.is_movie("exr"));
    }

    #[test]
    fn test_configured_parser_uses_compound_extensions() {
        let mut config = Config::default();
        config.compound_extensions = vec!["tar.xz".into()];
        let item = config.parser().parse("backup.0003.tar.xz").unwrap().unwrap();
        assert_eq!(item.extension(), "tar.xz");
        assert_eq!(item.frame_number(), 3);
    }
}
