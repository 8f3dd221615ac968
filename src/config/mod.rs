mod file_config;

pub use file_config::{FileConfig, GenerationApiConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be overridden by TOML config.
/// This struct mirrors the CLI arguments resolution happens against.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_timeout_secs: u64,
}

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub generation_api: GenerationApiSettings,
}

/// Settings for the external generation API client.
#[derive(Debug, Clone)]
pub struct GenerationApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GenerationApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8800".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let gen_file = file.generation_api.unwrap_or_default();
        let gen_defaults = GenerationApiSettings::default();
        let generation_api = GenerationApiSettings {
            base_url: gen_file
                .base_url
                .or_else(|| cli.api_base_url.clone())
                .unwrap_or(gen_defaults.base_url),
            api_key: gen_file.api_key.or_else(|| cli.api_key.clone()),
            timeout_secs: gen_file.timeout_secs.unwrap_or(cli.api_timeout_secs),
        };

        Ok(Self {
            db_dir,
            port,
            generation_api,
        })
    }

    pub fn song_db_path(&self) -> PathBuf {
        self.db_dir.join("songs.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn base_cli(db_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir.path().to_path_buf()),
            port: 3001,
            api_base_url: None,
            api_key: None,
            api_timeout_secs: 30,
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            api_base_url: Some("https://api.cli.example".to_string()),
            api_key: Some("cli-key".to_string()),
            ..base_cli(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3001);
        assert_eq!(config.generation_api.base_url, "https://api.cli.example");
        assert_eq!(config.generation_api.api_key.as_deref(), Some("cli-key"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            api_base_url: Some("https://api.cli.example".to_string()),
            ..base_cli(&temp_dir)
        };

        let file_config = FileConfig {
            port: Some(4000),
            generation_api: Some(GenerationApiConfig {
                base_url: Some("https://api.toml.example".to_string()),
                api_key: None,
                timeout_secs: Some(60),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.generation_api.base_url, "https://api.toml.example");
        assert_eq!(config.generation_api.timeout_secs, 60);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_default_api_base_url() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&base_cli(&temp_dir), None).unwrap();
        assert_eq!(config.generation_api.base_url, "http://localhost:8800");
    }

    #[test]
    fn test_song_db_path() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&base_cli(&temp_dir), None).unwrap();
        assert_eq!(config.song_db_path(), temp_dir.path().join("songs.db"));
    }
}
