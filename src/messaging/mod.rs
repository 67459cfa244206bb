//! Messaging API access.

pub mod synapse;

use async_trait::async_trait;

use crate::config::ContentType;
use crate::credentials::Credentials;
use crate::error::MessagingError;
use crate::subject::RecipientId;

pub use synapse::SynapseClient;

/// A service that delivers private messages to users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Authenticates and starts a new session.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), MessagingError>;

    /// Sends one message to the given recipients.
    async fn send_message(
        &self,
        recipients: &[RecipientId],
        subject: &str,
        body: &str,
        content_type: ContentType,
    ) -> Result<(), MessagingError>;
}
