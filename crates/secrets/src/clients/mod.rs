//! Vault client implementations
//!
//! This module provides built-in clients that require no external dependencies:
//!
//! - [`StaticVaultClient`] - In-memory secrets, for tests and dry runs
//!
//! Cloud providers are available via separate crates:
//!
//! - `azure` - Azure Key Vault (kvexport-azure crate)

mod memory;

pub use memory::StaticVaultClient;
