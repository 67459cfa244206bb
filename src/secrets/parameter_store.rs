//! SSM Parameter Store access through the Parameters and Secrets extension.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use super::SecretStore;
use crate::config::SecretStoreConfig;
use crate::error::SecretError;

/// Header the extension uses to authenticate callers.
const TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

/// Reads parameters from the extension's local HTTP endpoint.
pub struct ParameterStoreClient {
    /// Extension base URL.
    endpoint: String,
    /// Session token sent with every request.
    session_token: Option<String>,
    /// Whether to request decrypted values.
    with_decryption: bool,
    /// HTTP client.
    client: reqwest::Client,
}

impl ParameterStoreClient {
    /// Creates a new client from config and the caller's session token.
    pub fn new(
        config: &SecretStoreConfig,
        session_token: Option<String>,
    ) -> Result<Self, SecretError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            session_token,
            with_decryption: config.with_decryption,
            client,
        })
    }
}

#[async_trait]
impl SecretStore for ParameterStoreClient {
    async fn get_parameter(&self, key: &str) -> Result<String, SecretError> {
        let url = format!("{}/systemsmanager/parameters/get", self.endpoint);
        debug!(key, "Fetching parameter");

        let mut request = self.client.get(&url).query(&[
            ("name", key),
            ("withDecryption", if self.with_decryption { "true" } else { "false" }),
        ]);
        if let Some(token) = &self.session_token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let code = error_code(&text).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            error!(key, status = %status, code = %code, "Parameter retrieval failed");
            return Err(SecretError::RetrievalFailed {
                key: key.to_string(),
                code,
            });
        }

        let body: GetParameterResponse =
            response
                .json()
                .await
                .map_err(|e| SecretError::MalformedResponse {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;

        Ok(body.parameter.value)
    }
}

/// Extracts the service error code from an error body, if it has one.
fn error_code(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("__type")
        .or_else(|| value.get("code"))
        .and_then(|v| v.as_str())
        .map(|code| code.rsplit('#').next().unwrap_or(code).to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterResponse {
    parameter: Parameter,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_prefers_service_type() {
        assert_eq!(
            error_code(r#"{"__type":"com.amazonaws#ParameterNotFound","message":"x"}"#).as_deref(),
            Some("ParameterNotFound")
        );
        assert_eq!(
            error_code(r#"{"code":"AccessDenied"}"#).as_deref(),
            Some("AccessDenied")
        );
        assert_eq!(error_code("not json"), None);
    }
}
