//! Secret store access.

pub mod parameter_store;

use async_trait::async_trait;

use crate::error::SecretError;

pub use parameter_store::ParameterStoreClient;

/// A key/value service that returns decrypted secret values by key name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the value stored under `key`.
    async fn get_parameter(&self, key: &str) -> Result<String, SecretError>;
}
