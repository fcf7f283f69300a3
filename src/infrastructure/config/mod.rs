use crate::domain::csv::{ParserConfig, ParserKind};
use crate::domain::error::{AppError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "foodprice.toml";
pub const ENV_PREFIX: &str = "FOODPRICE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the prediction server listens
    pub prediction_base_url: String,
    /// Bind address of the local API
    pub api_host: String,
    pub api_port: u16,
    pub preview_rows: usize,
    pub parser: ParserKind,
    pub export_file_name: String,
    pub export_dir: PathBuf,
    /// Only directory `/api/batch/load` may read from; unset disables it
    pub import_dir: Option<PathBuf>,
    /// Browser origins allowed to call the API cross-origin
    pub allowed_origins: Vec<String>,
    /// Unset means no client-side timeout
    pub request_timeout_secs: Option<u64>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prediction_base_url: "http://127.0.0.1:5000".to_string(),
            api_host: "127.0.0.1".to_string(),
            api_port: 3001,
            preview_rows: 20,
            parser: ParserKind::Naive,
            export_file_name: "predictions.csv".to_string(),
            export_dir: PathBuf::from("."),
            import_dir: None,
            allowed_origins: Vec::new(),
            request_timeout_secs: None,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `foodprice.toml` if present, then `FOODPRICE_*`
    /// variables (a `.env` file is read into the environment first).
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(AppError::ConfigError(format!("Failed to read .env: {}", err))),
        }
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;

        config.validate()?;
        info!(
            prediction_base_url = %config.prediction_base_url,
            parser = ?config.parser,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.prediction_base_url).map_err(|e| {
            AppError::ConfigError(format!(
                "prediction_base_url '{}' is not a valid URL: {}",
                self.prediction_base_url, e
            ))
        })?;

        if self.export_file_name.trim().is_empty()
            || self.export_file_name.contains(['/', '\\'])
        {
            return Err(AppError::ConfigError(
                "export_file_name must be a plain file name".to_string(),
            ));
        }

        for origin in &self.allowed_origins {
            validate_origin(origin)?;
        }

        self.parser_config()
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid parser config: {}", e)))
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            kind: self.parser,
            preview_rows: self.preview_rows,
            ..ParserConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// `scheme://host[:port]` and nothing else; wildcards are refused.
fn validate_origin(origin: &str) -> Result<()> {
    let invalid = || {
        AppError::ConfigError(format!(
            "allowed_origins entry '{}' must be a scheme://host[:port] origin",
            origin
        ))
    };
    let url = url::Url::parse(origin).map_err(|_| invalid())?;
    if url.origin().ascii_serialization() != origin {
        return Err(invalid());
    }
    Ok(())
}
