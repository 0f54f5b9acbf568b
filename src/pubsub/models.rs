use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Pub/Sub message. `data` travels base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,

    /// Output only. Assigned by the server when the message is published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Output only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
}

impl PubsubMessage {
    pub fn from_data(data: &[u8]) -> Self {
        Self {
            data: Some(STANDARD.encode(data)),
            ..Default::default()
        }
    }

    /// Decoded payload; an absent `data` field decodes to an empty payload.
    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match &self.data {
            Some(data) => STANDARD.decode(data),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message: PubsubMessage,
    pub delivery_attempt: Option<i32>,
}

#[derive(Serialize)]
pub(crate) struct PublishRequest<'a> {
    pub(crate) messages: &'a [PubsubMessage],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishResponse {
    #[serde(default)]
    pub(crate) message_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequest {
    pub(crate) return_immediately: bool,
    pub(crate) max_messages: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullResponse {
    #[serde(default)]
    pub(crate) received_messages: Vec<ReceivedMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcknowledgeRequest<'a> {
    pub(crate) ack_ids: &'a [String],
}
