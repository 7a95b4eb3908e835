//! Farol Client - Device-side OTA update client
//!
//! Polls the server for a pending update, downloads the binary, verifies
//! hash and signature, installs through a platform-provided installer,
//! and reports status back. The client never installs unverified bytes:
//! both checks run before the installer is invoked, on every path.
//!
//! The library deliberately reports a single attempt's terminal outcome.
//! Retry counts, release skip-on-repeated-failure, and post-reboot
//! health verification (persist an "update just applied" flag, sanity
//! check on next boot, only then report success) belong to the calling
//! application.

pub mod client;
pub mod config;
pub mod error;
pub mod installer;

pub use client::{OtaUpdateClient, UpdateState};
pub use config::UpdateClientConfig;
pub use error::ClientError;
pub use installer::FirmwareInstaller;
