//! Synapse REST API client.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use super::MessagingClient;
use crate::config::{ContentType, MessagingConfig};
use crate::credentials::Credentials;
use crate::error::MessagingError;
use crate::subject::RecipientId;

const MULTIPART_REQUEST_TYPE: &str = "org.sagebionetworks.repo.model.file.MultipartUploadRequest";
const MESSAGE_FILE_NAME: &str = "message.txt";

/// Message bodies are uploaded as a single part.
const PART_NUMBER: u32 = 1;

/// Sends private messages through the Synapse REST API.
///
/// The body is uploaded to the file service with the multipart upload
/// protocol, and the resulting file handle is referenced from the message
/// submission.
pub struct SynapseClient {
    /// Authentication service base URL.
    auth_endpoint: String,
    /// Repository service base URL.
    repo_endpoint: String,
    /// File service base URL.
    file_endpoint: String,
    /// Directory where message bodies are staged during upload.
    cache_dir: PathBuf,
    /// Bearer token of the current session.
    access_token: Option<String>,
    /// HTTP client.
    client: reqwest::Client,
}

impl SynapseClient {
    /// Creates a client, creating the cache directory if needed.
    pub fn new(config: &MessagingConfig) -> Result<Self, MessagingError> {
        std::fs::create_dir_all(&config.cache_dir).map_err(|e| MessagingError::CacheDir {
            path: config.cache_dir.clone(),
            source: e,
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            auth_endpoint: trim(&config.auth_endpoint),
            repo_endpoint: trim(&config.repo_endpoint),
            file_endpoint: trim(&config.file_endpoint),
            cache_dir: config.cache_dir.clone(),
            access_token: None,
            client,
        })
    }

    /// Returns the directory used to stage message bodies.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Writes the body to a fresh temporary file in the cache directory.
    /// The file is removed when the returned handle is dropped.
    fn stage_body(&self, body: &str) -> Result<NamedTempFile, MessagingError> {
        let cache_err = |e: std::io::Error| MessagingError::CacheDir {
            path: self.cache_dir.clone(),
            source: e,
        };

        let mut staged = tempfile::Builder::new()
            .prefix("message-")
            .suffix(".txt")
            .tempfile_in(&self.cache_dir)
            .map_err(cache_err)?;
        staged.write_all(body.as_bytes()).map_err(cache_err)?;
        staged.flush().map_err(cache_err)?;

        Ok(staged)
    }

    /// Uploads the staged body and returns the resulting file handle id.
    async fn upload_body(
        &self,
        token: &str,
        staged: &Path,
        content_type: ContentType,
    ) -> Result<String, MessagingError> {
        let bytes = tokio::fs::read(staged)
            .await
            .map_err(|e| MessagingError::CacheDir {
                path: staged.to_path_buf(),
                source: e,
            })?;
        let md5_hex = hex::encode(Md5::digest(&bytes));

        let status: MultipartUploadStatus = self
            .post_file_service(
                token,
                "/file/multipart",
                &MultipartUploadRequest {
                    concrete_type: MULTIPART_REQUEST_TYPE,
                    file_name: MESSAGE_FILE_NAME,
                    content_type: content_type.as_str(),
                    content_md5_hex: &md5_hex,
                    file_size_bytes: bytes.len() as u64,
                    part_size_bytes: (bytes.len() as u64).max(1),
                },
            )
            .await?;

        // Synapse reuses a finished upload of identical content.
        if let Some(id) = status.completed_file_handle() {
            debug!(file_handle_id = %id, "Message body already uploaded");
            return Ok(id);
        }

        let upload_id = status.upload_id;
        let urls: BatchPresignedUploadUrlResponse = self
            .post_file_service(
                token,
                &format!("/file/multipart/{}/presigned/url/batch", upload_id),
                &BatchPresignedUploadUrlRequest {
                    upload_id: &upload_id,
                    part_numbers: vec![PART_NUMBER],
                    content_type: content_type.as_str(),
                },
            )
            .await?;
        let part = urls
            .part_presigned_urls
            .into_iter()
            .find(|p| p.part_number == PART_NUMBER)
            .ok_or_else(|| MessagingError::UploadFailed {
                status: 0,
                body: format!("no presigned URL for part {}", PART_NUMBER),
            })?;

        let mut put = self
            .client
            .put(&part.upload_presigned_url)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_str());
        for (name, value) in &part.signed_headers {
            if !name.eq_ignore_ascii_case("content-type") {
                put = put.header(name.as_str(), value.as_str());
            }
        }
        check_upload(put.body(bytes).send().await?, "Message body part upload").await?;

        let added: AddPartResponse = self
            .put_file_service(
                token,
                &format!(
                    "/file/multipart/{}/add/{}?partMD5Hex={}",
                    upload_id, PART_NUMBER, md5_hex
                ),
            )
            .await?;
        if added.add_part_state != "ADD_SUCCESS" {
            error!(upload_id = %upload_id, state = %added.add_part_state, "Adding upload part failed");
            return Err(MessagingError::UploadFailed {
                status: 0,
                body: added.error_message.unwrap_or(added.add_part_state),
            });
        }

        let status: MultipartUploadStatus = self
            .put_file_service(token, &format!("/file/multipart/{}/complete", upload_id))
            .await?;
        let id = status
            .completed_file_handle()
            .ok_or_else(|| MessagingError::UploadFailed {
                status: 0,
                body: format!("upload {} ended in state {}", upload_id, status.state),
            })?;

        debug!(file_handle_id = %id, "Message body uploaded");
        Ok(id)
    }

    async fn post_file_service<B, T>(
        &self,
        token: &str,
        route: &str,
        body: &B,
    ) -> Result<T, MessagingError>
    where
        B: Serialize + Sync,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}{}", self.file_endpoint, route))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        Ok(check_upload(response, route).await?.json().await?)
    }

    async fn put_file_service<T>(&self, token: &str, route: &str) -> Result<T, MessagingError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .put(format!("{}{}", self.file_endpoint, route))
            .bearer_auth(token)
            .send()
            .await?;

        Ok(check_upload(response, route).await?.json().await?)
    }
}

#[async_trait]
impl MessagingClient for SynapseClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), MessagingError> {
        self.access_token = None;

        let response = self
            .client
            .post(format!("{}/login2", self.auth_endpoint))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, username = %credentials.username, "Synapse login failed");
            return Err(MessagingError::LoginFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        let session: LoginResponse = response.json().await?;
        self.access_token = Some(session.access_token);

        info!(username = %credentials.username, "Logged in to Synapse");
        Ok(())
    }

    async fn send_message(
        &self,
        recipients: &[RecipientId],
        subject: &str,
        body: &str,
        content_type: ContentType,
    ) -> Result<(), MessagingError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(MessagingError::NotAuthenticated)?;

        let staged = self.stage_body(body)?;
        let file_handle_id = self.upload_body(token, staged.path(), content_type).await?;
        drop(staged);

        let response = self
            .client
            .post(format!("{}/message", self.repo_endpoint))
            .bearer_auth(token)
            .json(&MessageToUser {
                recipients: recipients.iter().map(RecipientId::as_str).collect(),
                subject,
                file_handle_id: &file_handle_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Synapse send message failed");
            return Err(MessagingError::SendFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        info!(recipients = ?recipients, "Message sent");
        Ok(())
    }
}

/// Maps a non-2xx upload step response to an error.
async fn check_upload(
    response: reqwest::Response,
    step: &str,
) -> Result<reqwest::Response, MessagingError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    error!(status = %status, step, body = %text, "Message body upload failed");
    Err(MessagingError::UploadFailed {
        status: status.as_u16(),
        body: text,
    })
}

fn trim(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Login request body.
#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Login response body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
}

/// Starts (or resumes) a multipart upload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MultipartUploadRequest<'a> {
    concrete_type: &'a str,
    file_name: &'a str,
    content_type: &'a str,
    #[serde(rename = "contentMD5Hex")]
    content_md5_hex: &'a str,
    file_size_bytes: u64,
    part_size_bytes: u64,
}

/// State of a multipart upload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultipartUploadStatus {
    upload_id: String,
    state: String,
    #[serde(default)]
    result_file_handle_id: Option<String>,
}

impl MultipartUploadStatus {
    fn completed_file_handle(&self) -> Option<String> {
        if self.state == "COMPLETED" {
            self.result_file_handle_id.clone()
        } else {
            None
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchPresignedUploadUrlRequest<'a> {
    upload_id: &'a str,
    part_numbers: Vec<u32>,
    content_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPresignedUploadUrlResponse {
    part_presigned_urls: Vec<PartPresignedUrl>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartPresignedUrl {
    part_number: u32,
    upload_presigned_url: String,
    #[serde(default)]
    signed_headers: std::collections::HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPartResponse {
    add_part_state: String,
    #[serde(default)]
    error_message: Option<String>,
}

/// Message submission body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageToUser<'a> {
    recipients: Vec<&'a str>,
    subject: &'a str,
    file_handle_id: &'a str,
}
