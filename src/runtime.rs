//! Lambda Runtime API client.
//!
//! The function host exposes a local HTTP API: the handler long-polls for
//! the next invocation and posts its result back under the request id.

use tracing::{debug, error, info};

use crate::error::RuntimeError;
use crate::event::InvocationResult;

/// Environment variable holding the runtime API host and port.
pub const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";

/// One pending invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Request id assigned by the host.
    pub request_id: String,
    /// Raw event payload.
    pub payload: Vec<u8>,
}

/// Talks to the function host's runtime API.
pub struct LambdaRuntime {
    /// Base URL, including the API version.
    base_url: String,
    /// HTTP client. Has no timeout: `next` blocks until work arrives.
    client: reqwest::Client,
}

impl LambdaRuntime {
    /// Creates a client for `host` (`host:port`, or a full http URL).
    pub fn new(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}/{}", host, API_VERSION)
        } else {
            format!("http://{}/{}", host, API_VERSION)
        };

        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Creates a client from `AWS_LAMBDA_RUNTIME_API`.
    pub fn from_env() -> Result<Self, RuntimeError> {
        let host = std::env::var(RUNTIME_API_VAR).map_err(|_| RuntimeError::MissingEndpoint)?;
        Ok(Self::new(&host))
    }

    /// Waits for the next invocation.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let response = self
            .client
            .get(format!("{}/runtime/invocation/next", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(RuntimeError::MissingRequestId)?;

        let payload = response.bytes().await?.to_vec();
        debug!(request_id = %request_id, bytes = payload.len(), "Received invocation");

        Ok(Invocation {
            request_id,
            payload,
        })
    }

    /// Posts the result of an invocation.
    pub async fn post_response(
        &self,
        request_id: &str,
        result: &InvocationResult,
    ) -> Result<(), RuntimeError> {
        let response = self
            .client
            .post(format!(
                "{}/runtime/invocation/{}/response",
                self.base_url, request_id
            ))
            .json(result)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        info!(request_id, error_code = result.error_code, "Posted invocation result");
        Ok(())
    }

    /// Reports a failure to start the handler.
    pub async fn post_init_error(&self, message: &str) -> Result<(), RuntimeError> {
        let response = self
            .client
            .post(format!("{}/runtime/init/error", self.base_url))
            .header("Lambda-Runtime-Function-Error-Type", "Runtime.InitError")
            .json(&serde_json::json!({
                "errorMessage": message,
                "errorType": "InitError",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        error!(message, "Reported init error");
        Ok(())
    }
}

async fn unexpected(response: reqwest::Response) -> RuntimeError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RuntimeError::UnexpectedStatus { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_accepts_host_or_url() {
        assert_eq!(
            LambdaRuntime::new("127.0.0.1:9001").base_url,
            "http://127.0.0.1:9001/2018-06-01"
        );
        assert_eq!(
            LambdaRuntime::new("http://localhost:9001/").base_url,
            "http://localhost:9001/2018-06-01"
        );
    }
}
