//! Configuration file loading and validation.

use std::path::Path;

use super::model::{CredentialSource, RelayConfig};
use crate::error::ConfigError;

/// Loads the configuration file from disk and parses it.
pub fn load_from_path(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    // An empty file means "all defaults".
    if content.trim().is_empty() {
        return Ok(RelayConfig::default());
    }

    let config: RelayConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(config)
}

/// Loads the configuration (or defaults when no path is given) and validates it.
pub fn load_and_validate(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            load_from_path(path)?
        }
        None => RelayConfig::default(),
    };

    validate(&config)?;
    Ok(config)
}

/// Checks field values that serde cannot.
pub fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    match &config.credentials {
        CredentialSource::Environment {
            username_var,
            password_var,
        } => {
            require_name("credentials.username_var", username_var)?;
            require_name("credentials.password_var", password_var)?;
        }
        CredentialSource::SecretStore {
            username_key_var,
            password_key_var,
        } => {
            require_name("credentials.username_key_var", username_key_var)?;
            require_name("credentials.password_key_var", password_key_var)?;
            require_url("secret_store.endpoint", &config.secret_store.endpoint)?;
            require_name(
                "secret_store.session_token_var",
                &config.secret_store.session_token_var,
            )?;
            if config.secret_store.timeout_secs == 0 {
                return Err(invalid(
                    "secret_store.timeout_secs",
                    "must be greater than zero",
                ));
            }
        }
    }

    let messaging = &config.messaging;
    require_url("messaging.auth_endpoint", &messaging.auth_endpoint)?;
    require_url("messaging.repo_endpoint", &messaging.repo_endpoint)?;
    require_url("messaging.file_endpoint", &messaging.file_endpoint)?;

    if messaging.cache_dir.as_os_str().is_empty() {
        return Err(invalid("messaging.cache_dir", "must not be empty"));
    }
    if messaging.timeout_secs == 0 {
        return Err(invalid("messaging.timeout_secs", "must be greater than zero"));
    }

    Ok(())
}

fn require_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "variable name must not be empty"));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(invalid(
            field,
            &format!("'{}' is not an http(s) URL", value),
        ));
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}
