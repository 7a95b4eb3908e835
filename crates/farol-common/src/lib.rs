//! Farol Common - Shared error types and release signing
//!
//! This crate provides the foundational pieces used across all Farol
//! components:
//! - Error types for the OTA deployment domain
//! - Firmware release signing and verification (RSA-PSS over SHA-256)

pub mod error;
pub mod signing;

// Re-exports for convenience
pub use error::FarolError;
pub use signing::{ReleaseSigner, SigningError, compute_hash, generate_key_pair};
