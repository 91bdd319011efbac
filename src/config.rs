use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_COPY_BUFFER_SIZE: usize = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to open config file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("copy buffer size must be greater than zero")]
    EmptyCopyBuffer,
}

/// Settings fixed when a channel is wrapped into a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnConfig {
    /// Closing the connection also closes the parent transport connection.
    pub exclusive: bool,
    /// Size of each read the background copy performs on the channel.
    pub copy_buffer_size: usize,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            exclusive: false,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl ConnConfig {
    pub fn shared() -> Self {
        Self::default()
    }

    pub fn exclusive() -> Self {
        Self {
            exclusive: true,
            ..Self::default()
        }
    }

    pub fn with_copy_buffer_size(mut self, copy_buffer_size: usize) -> Self {
        self.copy_buffer_size = copy_buffer_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copy_buffer_size == 0 {
            return Err(ConfigError::EmptyCopyBuffer);
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(io::BufReader::new(file)).map_err(|source| {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, ConnConfig, DEFAULT_COPY_BUFFER_SIZE};
    use crate::types::AppResult;

    #[test]
    fn test_missing_fields_use_defaults() -> AppResult<()> {
        let config: ConnConfig = serde_json::from_str(r#"{"exclusive": true}"#)?;
        assert!(config.exclusive);
        assert_eq!(config.copy_buffer_size, DEFAULT_COPY_BUFFER_SIZE);
        Ok(())
    }

    #[test]
    fn test_zero_copy_buffer_is_rejected() {
        let config = ConnConfig::shared().with_copy_buffer_size(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyCopyBuffer)
        ));
    }

    #[test]
    fn test_load_from_file() -> AppResult<()> {
        let path = std::env::temp_dir().join(format!("chconn-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"copy_buffer_size": 512}"#)?;

        let config = ConnConfig::from_json_file(&path)?;
        std::fs::remove_file(&path)?;

        assert!(!config.exclusive);
        assert_eq!(config.copy_buffer_size, 512);
        Ok(())
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = std::env::temp_dir().join("chconn-config-does-not-exist.json");
        let err = ConnConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Open { .. }));
        assert!(err.to_string().contains("chconn-config-does-not-exist.json"));
    }
}
