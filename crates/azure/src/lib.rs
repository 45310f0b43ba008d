//! Azure integration for kvexport
//!
//! This crate provides Azure service integrations for kvexport.
//! Currently supports:
//! - Azure Key Vault secrets via the [`secrets`] module

pub mod secrets;

// Re-export main types for convenience
pub use secrets::{AzureClientConfig, AzureKeyVaultClient, TOKEN_ENV};
