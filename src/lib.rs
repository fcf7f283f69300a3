pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

use crate::application::IngestionController;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server, HttpState};
use actix_web::web;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub fn run() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
            error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(err) = actix_web::rt::System::new().block_on(serve(config)) {
        error!(error = %err, "API server stopped");
        std::process::exit(1);
    }
}

async fn serve(config: AppConfig) -> std::io::Result<()> {
    let controller = IngestionController::from_config(&config).map_err(|err| {
        error!(error = %err, "Failed to build ingestion controller");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let state = web::Data::new(
        HttpState::new(Arc::new(controller), config.export_dir.clone())
            .with_import_dir(config.import_dir.clone())
            .with_allowed_origins(config.allowed_origins.clone()),
    );
    let logs = state.logs.clone();

    let server = start_server(state, &config.api_host, config.api_port)?;

    info!(
        host = %config.api_host,
        port = config.api_port,
        prediction_base_url = %config.prediction_base_url,
        "HTTP server started"
    );
    add_log(
        &logs,
        "INFO",
        "System",
        &format!(
            "Backend initialized and HTTP server started on {}:{}",
            config.api_host, config.api_port
        ),
    );

    server.await
}
