use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use serenata_server::config;
use serenata_server::generation::{GenerationStatusService, HttpGenerationClient};
use serenata_server::server::run_server;
use serenata_server::song_store::SqliteSongStore;

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (songs.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Base URL of the music-generation API.
    #[clap(long)]
    pub api_base_url: Option<String>,

    /// API key for the music-generation API.
    #[clap(long, env = "GENERATION_API_KEY")]
    pub api_key: Option<String>,

    /// Timeout in seconds for generation API requests.
    #[clap(long, default_value_t = 30)]
    pub api_timeout_secs: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            api_base_url: args.api_base_url.clone(),
            api_key: args.api_key.clone(),
            api_timeout_secs: args.api_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  generation api: {}", app_config.generation_api.base_url);

    // Create song store (will create DB if not exists)
    if !app_config.song_db_path().exists() {
        info!(
            "Creating new song database at {:?}",
            app_config.song_db_path()
        );
    }
    let song_store = Arc::new(SqliteSongStore::new(app_config.song_db_path())?);

    let client = Arc::new(HttpGenerationClient::new(
        app_config.generation_api.base_url.clone(),
        app_config.generation_api.api_key.clone(),
        app_config.generation_api.timeout_secs,
    ));

    let service = Arc::new(GenerationStatusService::new(song_store, client));

    let shutdown_token = CancellationToken::new();

    info!("Ready to serve at port {}!", app_config.port);

    tokio::select! {
        result = run_server(service, app_config.port, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_parse() {
        let args = CliArgs::parse_from([
            "serenata-server",
            "--port",
            "4000",
            "--api-base-url",
            "https://api.example",
            "--api-key",
            "k-123",
        ]);
        assert_eq!(args.port, 4000);
        assert_eq!(args.api_base_url.as_deref(), Some("https://api.example"));
        assert_eq!(args.api_key.as_deref(), Some("k-123"));
        assert_eq!(args.api_timeout_secs, 30);
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        // Temporary env mutation; fine as long as no other test reads it.
        std::env::set_var("GENERATION_API_KEY", "from-env");
        let args = CliArgs::parse_from(["serenata-server"]);
        assert_eq!(args.api_key.as_deref(), Some("from-env"));
        std::env::remove_var("GENERATION_API_KEY");
    }
}
