//! Binary storage collaborator
//!
//! Firmware bytes live outside the metadata store. The backend persists
//! them at release creation and issues time-limited download URLs that
//! devices fetch with a plain HTTPS GET. `LocalStorageBackend` keeps
//! binaries on the local filesystem and signs its URLs with HMAC-SHA256
//! so the serving endpoint can reject expired or forged links.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of an issued binary download URL
pub const DEFAULT_BINARY_URL_TTL: Duration = Duration::from_secs(3600);

const BINARY_FILE_NAME: &str = "firmware.bin";

/// Stores firmware binaries and issues download URLs for them
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a binary, returning the backend path it was stored under
    async fn store_binary(&self, release_id: &str, data: &[u8]) -> anyhow::Result<String>;

    async fn get_binary(&self, path: &str) -> anyhow::Result<Vec<u8>>;

    /// Issue a time-limited download URL for a stored binary
    async fn binary_url(&self, path: &str, ttl: Duration) -> anyhow::Result<String>;

    async fn delete_binary(&self, path: &str) -> anyhow::Result<()>;
}

/// Filesystem-backed storage with HMAC-signed download URLs.
///
/// Binaries are stored under `{base_dir}/{release_id}/firmware.bin` and
/// served back through the OTA API's binary endpoint, which validates
/// the `expires`/`token` query pair against the same secret.
pub struct LocalStorageBackend {
    base_dir: PathBuf,
    public_base_url: String,
    url_secret: Vec<u8>,
}

impl LocalStorageBackend {
    pub async fn new(
        base_dir: impl Into<PathBuf>,
        public_base_url: &str,
        url_secret: &[u8],
    ) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        tokio::fs::create_dir_all(&base_dir).await?;

        Ok(Self {
            base_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            url_secret: url_secret.to_vec(),
        })
    }

    /// Validate the signature and expiry of a download URL's query pair
    pub fn verify_url(&self, path: &str, expires: i64, token: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(token_bytes) = const_hex::decode(token) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.url_secret) else {
            return false;
        };
        mac.update(signing_input(path, expires).as_bytes());
        mac.verify_slice(&token_bytes).is_ok()
    }

    fn sign_url(&self, path: &str, expires: i64) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.url_secret)
            .map_err(|e| anyhow::anyhow!("invalid url secret: {}", e))?;
        mac.update(signing_input(path, expires).as_bytes());
        Ok(const_hex::encode(mac.finalize().into_bytes()))
    }

    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            anyhow::bail!("invalid binary path: {}", path);
        }
        Ok(self.base_dir.join(relative))
    }
}

fn signing_input(path: &str, expires: i64) -> String {
    format!("{}:{}", path, expires)
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn store_binary(&self, release_id: &str, data: &[u8]) -> anyhow::Result<String> {
        let relative = format!("{}/{}", release_id, BINARY_FILE_NAME);
        let full_path = self.resolve(&relative)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, data).await?;
        Ok(relative)
    }

    async fn get_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        Ok(tokio::fs::read(&full_path).await?)
    }

    async fn binary_url(&self, path: &str, ttl: Duration) -> anyhow::Result<String> {
        // The file must exist before a URL is handed to a device
        let full_path = self.resolve(path)?;
        tokio::fs::metadata(&full_path).await?;

        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        let token = self.sign_url(path, expires)?;
        Ok(format!(
            "{}/api/v1/ota/binaries/{}?expires={}&token={}",
            self.public_base_url, path, expires, token
        ))
    }

    async fn delete_binary(&self, path: &str) -> anyhow::Result<()> {
        let full_path = self.resolve(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_backend() -> (tempfile::TempDir, LocalStorageBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path(), "http://localhost:8080/", b"secret")
            .await
            .unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_store_get_delete_round_trip() {
        let (_dir, backend) = test_backend().await;

        let path = backend.store_binary("rel-1", b"binary bytes").await.unwrap();
        assert_eq!(path, "rel-1/firmware.bin");
        assert_eq!(backend.get_binary(&path).await.unwrap(), b"binary bytes");

        backend.delete_binary(&path).await.unwrap();
        assert!(backend.get_binary(&path).await.is_err());
        // Deleting an absent binary is not an error
        backend.delete_binary(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_binary_url_round_trips_through_verification() {
        let (_dir, backend) = test_backend().await;
        let path = backend.store_binary("rel-1", b"binary bytes").await.unwrap();

        let url = backend
            .binary_url(&path, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http://localhost:8080/api/v1/ota/binaries/rel-1/firmware.bin?"));

        let expires: i64 = url
            .split("expires=")
            .nth(1)
            .unwrap()
            .split('&')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        let token = url.split("token=").nth(1).unwrap();

        assert!(backend.verify_url(&path, expires, token));
        // Forged token and expired timestamp both fail
        assert!(!backend.verify_url(&path, expires, "deadbeef"));
        assert!(!backend.verify_url(&path, Utc::now().timestamp() - 1, token));
    }

    #[tokio::test]
    async fn test_url_for_missing_binary_is_refused() {
        let (_dir, backend) = test_backend().await;
        assert!(
            backend
                .binary_url("rel-unknown/firmware.bin", Duration::from_secs(60))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let (_dir, backend) = test_backend().await;
        assert!(backend.get_binary("../outside").await.is_err());
        assert!(backend.get_binary("/etc/passwd").await.is_err());
    }
}
