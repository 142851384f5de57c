//! Model viewer
//!
//! Shows the configured OBJ model with its texture, spinning about +Z. Settings
//! come from the TOML or RON file named by `PV_CONFIG`, or the built-in defaults.

use pv_engine::config::{Config, ConfigError};
use pv_engine::core::config::ApplicationConfig;
use pv_engine::{AppError, Application};
use thiserror::Error;

/// Environment variable naming an optional configuration file
const CONFIG_ENV: &str = "PV_CONFIG";

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Failed to load configuration from {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

fn load_config() -> Result<(ApplicationConfig, Option<String>), ViewerError> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let config = ApplicationConfig::load_from_file(&path)
                .map_err(|source| ViewerError::Config { path: path.clone(), source })?;
            Ok((config, Some(path)))
        }
        Err(_) => Ok((ApplicationConfig::default(), None)),
    }
}

fn run() -> Result<(), ViewerError> {
    let (config, source) = load_config()?;

    pv_engine::foundation::logging::init_with_level(config.effective_log_level());

    match source {
        Some(path) => log::info!("Loaded configuration from {}", path),
        None => log::info!("Using default configuration"),
    }

    let mut app = Application::new(config)?;
    app.run()?;
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
