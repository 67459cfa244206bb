//! Stubbed Synapse services shared by the integration tests.
#![allow(dead_code)]

use md5::{Digest, Md5};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS_TOKEN: &str = "tok-123";
pub const FILE_HANDLE_ID: &str = "98765";

pub fn md5_hex(body: &str) -> String {
    hex::encode(Md5::digest(body.as_bytes()))
}

/// Accepts `username`/`password` and issues [`ACCESS_TOKEN`].
pub async fn mount_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/login2"))
        .and(body_json(json!({ "username": "username", "password": "password" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "accessToken": ACCESS_TOKEN })),
        )
        .expect(expected)
        .mount(server)
        .await;
}

/// Runs one multipart upload of exactly `body`, sent as `content_type`.
/// Each body gets its own upload id so several can be mounted at once.
pub async fn mount_body_upload(
    server: &MockServer,
    upload_id: &str,
    body: &str,
    content_type: &str,
    expected: u64,
) {
    let md5 = md5_hex(body);
    let bearer = format!("Bearer {}", ACCESS_TOKEN);

    Mock::given(method("POST"))
        .and(path("/file/v1/file/multipart"))
        .and(header("authorization", bearer.as_str()))
        .and(body_partial_json(json!({
            "concreteType": "org.sagebionetworks.repo.model.file.MultipartUploadRequest",
            "contentType": content_type,
            "contentMD5Hex": md5,
            "fileSizeBytes": body.len(),
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uploadId": upload_id,
            "state": "UPLOADING",
            "partsState": "0"
        })))
        .expect(expected)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/file/v1/file/multipart/{}/presigned/url/batch", upload_id)))
        .and(body_partial_json(json!({ "uploadId": upload_id, "partNumbers": [1] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "partPresignedUrls": [{
                "partNumber": 1,
                "uploadPresignedUrl": format!("{}/s3/{}/part-1", server.uri(), upload_id),
                "signedHeaders": { "Content-Type": content_type }
            }]
        })))
        .expect(expected)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/s3/{}/part-1", upload_id)))
        .and(header("content-type", content_type))
        .and(body_string(body))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/file/v1/file/multipart/{}/add/1", upload_id)))
        .and(query_param("partMD5Hex", md5.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadId": upload_id,
            "partNumber": 1,
            "addPartState": "ADD_SUCCESS"
        })))
        .expect(expected)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/file/v1/file/multipart/{}/complete", upload_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadId": upload_id,
            "state": "COMPLETED",
            "resultFileHandleId": FILE_HANDLE_ID
        })))
        .expect(expected)
        .mount(server)
        .await;
}

/// Accepts a message to `recipient` referencing [`FILE_HANDLE_ID`].
pub async fn mount_message(server: &MockServer, recipient: &str, subject: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/repo/v1/message"))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .and(body_json(json!({
            "recipients": [recipient],
            "subject": subject,
            "fileHandleId": FILE_HANDLE_ID
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "7" })))
        .expect(expected)
        .mount(server)
        .await;
}
