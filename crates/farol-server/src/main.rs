//! Main entry point for the Farol OTA server.
//!
//! Wires persistence, storage, signing, and the device registry into the
//! OTA service and serves the HTTP API.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{error, info};

use farol_ota::api::OtaState;
use farol_ota::{LocalStorageBackend, OtaService, StaticDeviceRegistry};
use farol_persistence::{ExternalDbOtaPersistence, InMemoryOtaPersistence, OtaPersistence};
use farol_server::config::{Configuration, StorageMode};
use farol_server::startup;

#[derive(Debug, Parser)]
#[command(name = "farol-server", about = "Farol OTA deployment server")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "FAROL_CONFIG", default_value = "config/farol.yaml")]
    config: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::load(&cli.config)?;

    startup::init_logging(&configuration.log_level)?;
    info!("Persistence mode: {}", configuration.persistence.mode);

    let persistence: Arc<dyn OtaPersistence> = match configuration.persistence.mode {
        StorageMode::Memory => Arc::new(InMemoryOtaPersistence::new()),
        StorageMode::Database => {
            let url = configuration.persistence.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("persistence.database_url is required in database mode")
            })?;
            let db = sea_orm::Database::connect(url).await?;
            Arc::new(ExternalDbOtaPersistence::new(db))
        }
    };

    let signer = Arc::new(startup::load_or_generate_signer(&configuration.signing).await?);

    let storage = Arc::new(
        LocalStorageBackend::new(
            &configuration.storage.base_dir,
            &configuration.storage.public_url,
            configuration.storage.url_secret.as_bytes(),
        )
        .await?,
    );

    let registry = Arc::new(StaticDeviceRegistry::new());
    for enrollment in &configuration.devices {
        registry.enroll(
            &enrollment.template_id,
            enrollment.channel,
            &enrollment.device_id,
        );
    }
    info!(devices = configuration.devices.len(), "Device registry initialised");

    let service = Arc::new(OtaService::new(
        persistence,
        registry,
        storage.clone(),
        signer,
    ));

    let state = web::Data::new(OtaState {
        service,
        local_storage: Some(storage),
    });

    let address = configuration.server.address.clone();
    let port = configuration.server.port;
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(farol_ota::api::routes())
    })
    .bind((address.as_str(), port))?
    .run();

    info!("Farol OTA server listening on {}:{}", address, port);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully");
        }
    }

    info!("Farol server shutdown complete");
    Ok(())
}
