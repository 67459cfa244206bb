//! Configuration data structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure containing all settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Where the messaging API credentials come from.
    #[serde(default)]
    pub credentials: CredentialSource,

    /// Secret store extension settings.
    #[serde(default)]
    pub secret_store: SecretStoreConfig,

    /// Messaging API settings.
    #[serde(default)]
    pub messaging: MessagingConfig,
}

/// Source of the messaging API username and password.
///
/// Both variants only name environment variables. In `environment` mode the
/// variables hold the credentials; in `secret_store` mode they hold the
/// secret store keys under which the credentials live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CredentialSource {
    Environment {
        #[serde(default = "default_username_var")]
        username_var: String,
        #[serde(default = "default_password_var")]
        password_var: String,
    },
    SecretStore {
        #[serde(default = "default_username_key_var")]
        username_key_var: String,
        #[serde(default = "default_password_key_var")]
        password_key_var: String,
    },
}

/// Parameters and Secrets extension settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStoreConfig {
    /// Base URL of the extension's local HTTP endpoint.
    #[serde(default = "default_secret_store_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the extension auth token.
    #[serde(default = "default_session_token_var")]
    pub session_token_var: String,

    /// Whether to ask the store to decrypt SecureString values.
    #[serde(default = "default_true")]
    pub with_decryption: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_secret_store_timeout_secs")]
    pub timeout_secs: u64,
}

/// Messaging API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Authentication service base URL.
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// Repository service base URL (message submission).
    #[serde(default = "default_repo_endpoint")]
    pub repo_endpoint: String,

    /// File service base URL (message body upload).
    #[serde(default = "default_file_endpoint")]
    pub file_endpoint: String,

    /// Writable directory used to stage message bodies.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Content type of forwarded message bodies.
    #[serde(default)]
    pub content_type: ContentType,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Content type of a message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    #[serde(rename = "text/plain")]
    PlainText,
    #[serde(rename = "text/html")]
    Html,
}

impl ContentType {
    /// Returns the MIME type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Default value functions

fn default_username_var() -> String {
    "SYNAPSE_USER_NAME".to_string()
}

fn default_password_var() -> String {
    "SYNAPSE_PASSWORD".to_string()
}

fn default_username_key_var() -> String {
    "SYNAPSE_USER_NAME_PARAMETER".to_string()
}

fn default_password_key_var() -> String {
    "SYNAPSE_PASSWORD_PARAMETER".to_string()
}

fn default_secret_store_endpoint() -> String {
    "http://localhost:2773".to_string()
}

fn default_session_token_var() -> String {
    "AWS_SESSION_TOKEN".to_string()
}

fn default_secret_store_timeout_secs() -> u64 {
    5
}

fn default_auth_endpoint() -> String {
    "https://repo-prod.prod.sagebase.org/auth/v1".to_string()
}

fn default_repo_endpoint() -> String {
    "https://repo-prod.prod.sagebase.org/repo/v1".to_string()
}

fn default_file_endpoint() -> String {
    "https://repo-prod.prod.sagebase.org/file/v1".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/tmp/synapse-cache")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Environment {
            username_var: default_username_var(),
            password_var: default_password_var(),
        }
    }
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_secret_store_endpoint(),
            session_token_var: default_session_token_var(),
            with_decryption: true,
            timeout_secs: default_secret_store_timeout_secs(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            auth_endpoint: default_auth_endpoint(),
            repo_endpoint: default_repo_endpoint(),
            file_endpoint: default_file_endpoint(),
            cache_dir: default_cache_dir(),
            content_type: ContentType::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
