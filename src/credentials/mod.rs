//! Messaging API credential resolution.
//!
//! Credentials either live directly in environment variables, or the
//! environment names secret store keys and the values are fetched from the
//! store. The second case is split into [`resolve`] (variable to key) and
//! [`fetch`] (key to secret).

pub mod env;

use tracing::debug;

use crate::config::CredentialSource;
use crate::error::{ConfigError, RelayError, SecretError};
use crate::secrets::SecretStore;

pub use env::{EnvSource, ProcessEnv};

/// Username and password for the messaging API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads a required, non-empty environment variable.
pub fn resolve(env: &dyn EnvSource, name: &str) -> Result<String, ConfigError> {
    match env.var(name) {
        None => Err(ConfigError::MissingVariable {
            name: name.to_string(),
        }),
        Some(value) if value.is_empty() => Err(ConfigError::EmptyVariable {
            name: name.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

/// Fetches the secret stored under `key`.
pub async fn fetch(store: &dyn SecretStore, key: &str) -> Result<String, SecretError> {
    store.get_parameter(key).await
}

/// Resolves credentials for the configured source.
///
/// Both variable names are checked before the secret store is contacted.
pub async fn resolve_credentials(
    source: &CredentialSource,
    env: &dyn EnvSource,
    store: &dyn SecretStore,
) -> Result<Credentials, RelayError> {
    match source {
        CredentialSource::Environment {
            username_var,
            password_var,
        } => {
            debug!(username_var, password_var, "Reading credentials from environment");
            Ok(Credentials {
                username: resolve(env, username_var)?,
                password: resolve(env, password_var)?,
            })
        }
        CredentialSource::SecretStore {
            username_key_var,
            password_key_var,
        } => {
            let username_key = resolve(env, username_key_var)?;
            let password_key = resolve(env, password_key_var)?;
            debug!(%username_key, %password_key, "Reading credentials from secret store");
            Ok(Credentials {
                username: fetch(store, &username_key).await?,
                password: fetch(store, &password_key).await?,
            })
        }
    }
}
