//! Startup helpers: logging and signing key provisioning

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use farol_common::{FarolError, ReleaseSigner, generate_key_pair};

use crate::config::SigningConfig;

/// Initialise tracing with an env-filter; `RUST_LOG` overrides the
/// configured level.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
}

/// Load the release signing key pair, generating and persisting one on
/// first start when configured to.
pub async fn load_or_generate_signer(signing: &SigningConfig) -> anyhow::Result<ReleaseSigner> {
    let private_path = Path::new(&signing.private_key_path);
    let public_path = Path::new(&signing.public_key_path);

    if private_path.exists() && public_path.exists() {
        let private_pem = tokio::fs::read_to_string(private_path).await?;
        let public_pem = tokio::fs::read_to_string(public_path).await?;
        return Ok(ReleaseSigner::new(&private_pem, &public_pem)?);
    }

    if !signing.auto_generate {
        return Err(FarolError::KeyNotConfigured(format!(
            "signing keys not found at {} / {}",
            signing.private_key_path, signing.public_key_path
        ))
        .into());
    }

    info!(bits = signing.key_bits, "Generating release signing key pair");
    let (private_pem, public_pem) = generate_key_pair(signing.key_bits)?;

    if let Some(parent) = private_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Some(parent) = public_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(private_path, &private_pem).await?;
    tokio::fs::write(public_path, &public_pem).await?;
    info!(
        private_key = %signing.private_key_path,
        public_key = %signing.public_key_path,
        "Persisted release signing key pair"
    );

    Ok(ReleaseSigner::new(&private_pem, &public_pem)?)
}
