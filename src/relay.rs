//! Alert relay: forwards each notification to the user named in its subject.

use tracing::{error, info, warn};

use crate::config::{ContentType, CredentialSource};
use crate::credentials::{self, EnvSource};
use crate::error::RelayError;
use crate::event::{InvocationResult, NotificationRecord, SnsEvent};
use crate::messaging::MessagingClient;
use crate::secrets::SecretStore;
use crate::subject::{parse_recipient_id, RecipientId};

/// Forwards notification batches through a messaging client.
pub struct AlertRelay<E, S, M> {
    /// Where credentials come from.
    credential_source: CredentialSource,
    /// Environment used for credential resolution.
    env: E,
    /// Secret store used in `secret_store` mode.
    secrets: S,
    /// Messaging API client.
    messaging: M,
    /// Content type of forwarded bodies.
    content_type: ContentType,
}

impl<E, S, M> AlertRelay<E, S, M>
where
    E: EnvSource,
    S: SecretStore,
    M: MessagingClient,
{
    /// Creates a new relay.
    pub fn new(
        credential_source: CredentialSource,
        env: E,
        secrets: S,
        messaging: M,
        content_type: ContentType,
    ) -> Self {
        Self {
            credential_source,
            env,
            secrets,
            messaging,
            content_type,
        }
    }

    /// Returns the messaging client.
    pub fn messaging(&self) -> &M {
        &self.messaging
    }

    /// Handles one invocation. Never fails; errors are reported in the result.
    pub async fn handle(&mut self, event: &SnsEvent) -> InvocationResult {
        let records = event.notification_records();
        self.handle_records(&records).await
    }

    /// Handles a raw JSON payload. A payload that is not an SNS event fails
    /// the invocation like any other error.
    pub async fn handle_json(&mut self, payload: &[u8]) -> InvocationResult {
        match serde_json::from_slice::<SnsEvent>(payload) {
            Ok(event) => self.handle(&event).await,
            Err(e) => {
                let e = RelayError::Event(e.to_string());
                error!(kind = %e.kind(), error = %e, "Invocation failed");
                InvocationResult::failure(e.to_string())
            }
        }
    }

    /// Handles a batch of records, converting any failure into the result.
    pub async fn handle_records(&mut self, records: &[NotificationRecord]) -> InvocationResult {
        match self.relay(records).await {
            Ok(sent) => {
                info!(sent, "Invocation completed");
                InvocationResult::success()
            }
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Invocation failed");
                InvocationResult::failure(e.to_string())
            }
        }
    }

    /// Logs in once, then forwards records in order, stopping at the first failure.
    async fn relay(&mut self, records: &[NotificationRecord]) -> Result<usize, RelayError> {
        let creds = credentials::resolve_credentials(
            &self.credential_source,
            &self.env,
            &self.secrets,
        )
        .await?;
        self.messaging.login(&creds).await?;

        for (index, record) in records.iter().enumerate() {
            let recipient = recipient_for(record)?;
            info!(index, recipient = %recipient, "Forwarding notification");

            self.messaging
                .send_message(
                    std::slice::from_ref(&recipient),
                    record.subject.as_deref().unwrap_or_default(),
                    &record.body,
                    self.content_type,
                )
                .await?;
        }

        Ok(records.len())
    }
}

/// Picks the recipient of a record: the id in its subject, or failing that
/// a numeric id attribute supplied by the publisher.
fn recipient_for(record: &NotificationRecord) -> Result<RecipientId, RelayError> {
    if let Some(id) = parse_recipient_id(record.subject.as_deref()) {
        return Ok(id);
    }

    if let Some(attribute) = &record.recipient_attribute {
        match RecipientId::new(attribute.trim()) {
            Some(id) => return Ok(id),
            None => warn!(attribute = %attribute, "Ignoring non-numeric recipient attribute"),
        }
    }

    Err(RelayError::UnparseableSubject {
        subject: record.subject.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MessagingError, SecretError};
    use crate::messaging::MockMessagingClient;
    use crate::secrets::MockSecretStore;
    use mockall::Sequence;
    use std::collections::HashMap;

    const SUBJECT: &str = "AWS Budgets: service-catalog_3388489 ...hold";

    fn env() -> HashMap<String, String> {
        HashMap::from([
            ("SYNAPSE_USER_NAME".to_string(), "username".to_string()),
            ("SYNAPSE_PASSWORD".to_string(), "password".to_string()),
        ])
    }

    fn record(subject: Option<&str>, body: &str) -> NotificationRecord {
        NotificationRecord {
            subject: subject.map(str::to_string),
            body: body.to_string(),
            recipient_attribute: None,
        }
    }

    fn relay(
        env: HashMap<String, String>,
        messaging: MockMessagingClient,
    ) -> AlertRelay<HashMap<String, String>, MockSecretStore, MockMessagingClient> {
        AlertRelay::new(
            CredentialSource::default(),
            env,
            MockSecretStore::new(),
            messaging,
            ContentType::PlainText,
        )
    }

    fn expect_login(messaging: &mut MockMessagingClient) {
        messaging
            .expect_login()
            .withf(|c| c.username == "username" && c.password == "password")
            .times(1)
            .returning(|_| Ok(()));
    }

    #[tokio::test]
    async fn forwards_subject_and_body_to_embedded_recipient() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging
            .expect_send_message()
            .withf(|recipients, subject, body, content_type| {
                recipients == [RecipientId::new("3388489").unwrap()]
                    && subject == SUBJECT
                    && body == "test test"
                    && *content_type == ContentType::PlainText
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let result = relay(env(), messaging)
            .handle_records(&[record(Some(SUBJECT), "test test")])
            .await;

        assert_eq!(result, InvocationResult::success());
    }

    #[tokio::test]
    async fn subject_without_id_fails_without_sending() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging.expect_send_message().never();

        let result = relay(env(), messaging)
            .handle_records(&[record(Some("test message"), "test test")])
            .await;

        assert_eq!(result.error_code, 1);
        assert!(result.error_message.unwrap().contains("test message"));
    }

    #[tokio::test]
    async fn missing_environment_variable_skips_login() {
        let mut messaging = MockMessagingClient::new();
        messaging.expect_login().never();
        messaging.expect_send_message().never();

        let mut vars = env();
        vars.remove("SYNAPSE_USER_NAME");

        let result = relay(vars, messaging)
            .handle_records(&[record(Some(SUBJECT), "test test")])
            .await;

        assert_eq!(result.error_code, 1);
        assert!(result.error_message.unwrap().contains("SYNAPSE_USER_NAME"));
    }

    #[tokio::test]
    async fn empty_batch_still_logs_in() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging.expect_send_message().never();

        let result = relay(env(), messaging).handle_records(&[]).await;

        assert!(result.is_success());
    }

    #[tokio::test]
    async fn login_failure_is_reported() {
        let mut messaging = MockMessagingClient::new();
        messaging.expect_login().returning(|_| {
            Err(MessagingError::LoginFailed {
                status: 401,
                body: "invalid credentials".to_string(),
            })
        });
        messaging.expect_send_message().never();

        let result = relay(env(), messaging)
            .handle_records(&[record(Some(SUBJECT), "test test")])
            .await;

        assert_eq!(result.error_code, 1);
        assert!(result.error_message.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn send_failure_halts_the_batch() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging
            .expect_send_message()
            .times(1)
            .returning(|_, _, _, _| {
                Err(MessagingError::SendFailed {
                    status: 500,
                    body: "unavailable".to_string(),
                })
            });

        let result = relay(env(), messaging)
            .handle_records(&[
                record(Some(SUBJECT), "first"),
                record(Some("AWS Budgets: service-catalog_42 ...hold"), "second"),
            ])
            .await;

        assert_eq!(result.error_code, 1);
    }

    #[tokio::test]
    async fn records_are_forwarded_in_order_until_first_bad_subject() {
        let mut messaging = MockMessagingClient::new();
        let mut seq = Sequence::new();
        expect_login(&mut messaging);
        messaging
            .expect_send_message()
            .withf(|recipients, _, body, _| recipients[0].as_str() == "1" && body == "first")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        messaging
            .expect_send_message()
            .withf(|recipients, _, body, _| recipients[0].as_str() == "2" && body == "second")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));

        let result = relay(env(), messaging)
            .handle_records(&[
                record(Some("service-catalog_1"), "first"),
                record(Some("service-catalog_2"), "second"),
                record(None, "third"),
                record(Some("service-catalog_4"), "fourth"),
            ])
            .await;

        assert_eq!(result.error_code, 1);
    }

    #[tokio::test]
    async fn falls_back_to_recipient_attribute() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging
            .expect_send_message()
            .withf(|recipients, subject, _, _| {
                recipients[0].as_str() == "273950" && subject == "Budget exceeded"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut with_attribute = record(Some("Budget exceeded"), "body");
        with_attribute.recipient_attribute = Some("273950".to_string());

        let result = relay(env(), messaging)
            .handle_records(&[with_attribute])
            .await;

        assert!(result.is_success());
    }

    #[tokio::test]
    async fn non_numeric_attribute_is_not_a_recipient() {
        let mut messaging = MockMessagingClient::new();
        expect_login(&mut messaging);
        messaging.expect_send_message().never();

        let mut with_attribute = record(Some("Budget exceeded"), "body");
        with_attribute.recipient_attribute = Some("someone".to_string());

        let result = relay(env(), messaging)
            .handle_records(&[with_attribute])
            .await;

        assert_eq!(result.error_code, 1);
    }

    #[tokio::test]
    async fn malformed_payload_fails_without_credentials() {
        let mut messaging = MockMessagingClient::new();
        messaging.expect_login().never();

        let result = relay(env(), messaging)
            .handle_json(br#"{"Records": "nope"}"#)
            .await;

        assert_eq!(result.error_code, 1);
        assert!(result.error_message.unwrap().starts_with("Malformed event"));
    }

    #[tokio::test]
    async fn secret_store_failure_skips_login() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_get_parameter().returning(|key| {
            Err(SecretError::RetrievalFailed {
                key: key.to_string(),
                code: "ParameterNotFound".to_string(),
            })
        });
        let mut messaging = MockMessagingClient::new();
        messaging.expect_login().never();

        let vars = HashMap::from([
            ("USER_PARAM".to_string(), "/synapse/user".to_string()),
            ("PASS_PARAM".to_string(), "/synapse/pass".to_string()),
        ]);
        let mut relay = AlertRelay::new(
            CredentialSource::SecretStore {
                username_key_var: "USER_PARAM".to_string(),
                password_key_var: "PASS_PARAM".to_string(),
            },
            vars,
            secrets,
            messaging,
            ContentType::PlainText,
        );

        let result = relay.handle(&SnsEvent::default()).await;

        assert_eq!(result.error_code, 1);
        assert!(result.error_message.unwrap().contains("ParameterNotFound"));
    }
}
