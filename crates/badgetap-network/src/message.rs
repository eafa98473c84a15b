//! Outbound queue message and its wire representation.
//!
//! On the wire each message is one line of JSON:
//!
//! ```text
//! {"messageId":"…","label":"ClockInAndOut","contentType":"application/json",
//!  "timeToLiveSecs":120,"body":{"loginId":"04A1B2C3"}}
//! ```
//!
//! and the queue answers with one line `{"messageId":"…","status":"accepted"}`.

use badgetap_core::Uid;
use badgetap_core::constants::{MESSAGE_CONTENT_TYPE, MESSAGE_LABEL, MESSAGE_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Status value acknowledging a message.
pub const STATUS_ACCEPTED: &str = "accepted";

/// A UID notification ready to be sent to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Uid,
    pub content_type: &'static str,
    pub label: &'static str,
    pub message_id: Uuid,
    pub time_to_live: Duration,
}

impl OutboundMessage {
    /// Build a message for `uid` with a fresh message id.
    ///
    /// # Example
    ///
    /// ```
    /// use badgetap_network::OutboundMessage;
    ///
    /// let message = OutboundMessage::new("04A1B2C3".parse().unwrap());
    /// assert_eq!(message.label, "ClockInAndOut");
    /// assert_eq!(message.time_to_live.as_secs(), 120);
    /// ```
    pub fn new(uid: Uid) -> Self {
        Self {
            payload: uid,
            content_type: MESSAGE_CONTENT_TYPE,
            label: MESSAGE_LABEL,
            message_id: Uuid::new_v4(),
            time_to_live: Duration::from_secs(MESSAGE_TTL_SECS),
        }
    }

    /// JSON body carried by the message.
    pub fn body(&self) -> LoginBody<'_> {
        LoginBody {
            login_id: self.payload.as_str(),
        }
    }

    /// Encode the message as one wire line, without the newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&WireMessage {
            message_id: self.message_id,
            label: self.label,
            content_type: self.content_type,
            time_to_live_secs: self.time_to_live.as_secs(),
            body: self.body(),
        })
    }
}

/// Message body `{"loginId": "<uid>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody<'a> {
    pub login_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage<'a> {
    message_id: Uuid,
    label: &'a str,
    content_type: &'a str,
    time_to_live_secs: u64,
    body: LoginBody<'a>,
}

/// Queue acknowledgement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReply {
    pub message_id: Uuid,
    pub status: String,
}

impl QueueReply {
    /// Acknowledgement of `message_id`.
    pub fn accepted(message_id: Uuid) -> Self {
        Self {
            message_id,
            status: STATUS_ACCEPTED.to_string(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_ACCEPTED
    }
}
