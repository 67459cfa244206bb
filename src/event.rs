//! SNS notification event definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Message attribute carrying a pre-extracted Synapse user id.
pub const RECIPIENT_ATTRIBUTE: &str = "SynapseId";

/// An SNS-delivered invocation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SnsEventRecord>,
}

/// One record of an SNS event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsEventRecord {
    #[serde(rename = "Sns")]
    pub sns: SnsMessage,
}

/// The notification carried by a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsMessage {
    #[serde(default)]
    pub subject: Option<String>,

    pub message: String,

    #[serde(default)]
    pub message_attributes: HashMap<String, MessageAttribute>,
}

/// A typed SNS message attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,

    pub value: String,
}

/// One unit of work for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Notification subject, forwarded as the message title.
    pub subject: Option<String>,
    /// Notification body, forwarded as the message content.
    pub body: String,
    /// User id supplied by the publisher as a message attribute.
    pub recipient_attribute: Option<String>,
}

impl From<&SnsEventRecord> for NotificationRecord {
    fn from(record: &SnsEventRecord) -> Self {
        let sns = &record.sns;
        Self {
            subject: sns.subject.clone(),
            body: sns.message.clone(),
            recipient_attribute: sns
                .message_attributes
                .get(RECIPIENT_ATTRIBUTE)
                .map(|attr| attr.value.clone()),
        }
    }
}

impl SnsEvent {
    /// Returns the event's records as relay work items, in delivery order.
    pub fn notification_records(&self) -> Vec<NotificationRecord> {
        self.records.iter().map(NotificationRecord::from).collect()
    }
}

/// The value returned to the event source for every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// 0 if every record was forwarded, 1 otherwise.
    pub error_code: u8,
    /// Describes the failure when `error_code` is 1.
    pub error_message: Option<String>,
}

impl InvocationResult {
    pub fn success() -> Self {
        Self {
            error_code: 0,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_code: 1,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}
