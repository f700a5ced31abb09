//! Delivered messages: acknowledgment signals and delivery metadata.
//!
//! Every message delivered through a bound subscription is surfaced as a
//! [`JsMessage`]. Acknowledging encodes one of four signals on the
//! message's reply subject; for pull consumers the positive path instead
//! re-arms the pull stream with a next-batch request. Delivery metadata is
//! decoded on demand from the reply subject's 9-token layout:
//!
//! ```text
//! $JS.ACK.{stream}.{consumer}.{delivered}.{streamSeq}.{consumerSeq}.{timestampNanos}.{pending}
//! ```

use std::sync::Arc;

use async_nats::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::context::JetStreamContext;
use crate::error::ClientError;
use crate::subscribe::ConsumerBinding;
use crate::transport::Delivery;

/// Positive acknowledgment.
pub const ACK_ACK: &[u8] = b"+ACK";
/// Negative acknowledgment; the message will be redelivered.
pub const ACK_NAK: &[u8] = b"-NAK";
/// Work in progress; resets the server's redelivery timer.
pub const ACK_PROGRESS: &[u8] = b"+WPI";
/// Terminate delivery regardless of the remaining delivery budget.
pub const ACK_TERM: &[u8] = b"+TERM";
/// Pull re-arm token sent in place of a positive ack on pull consumers.
pub const ACK_NEXT: &[u8] = b"+NXT";

/// NAK/TERM on a pull consumer still needs one replacement message.
const ACK_NEXT_ONE: &[u8] = br#"+NXT {"batch":1}"#;

/// The four acknowledgment signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nak,
    InProgress,
    Term,
}

impl AckKind {
    /// Literal signal bytes sent to the reply subject in push mode.
    pub fn body(self) -> &'static [u8] {
        match self {
            AckKind::Ack => ACK_ACK,
            AckKind::Nak => ACK_NAK,
            AckKind::InProgress => ACK_PROGRESS,
            AckKind::Term => ACK_TERM,
        }
    }
}

/// A message delivered through a bound JetStream subscription.
#[derive(Clone)]
pub struct JsMessage {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
    context: JetStreamContext,
    binding: Arc<Mutex<ConsumerBinding>>,
}

impl JsMessage {
    pub(crate) fn new(
        context: JetStreamContext,
        binding: Arc<Mutex<ConsumerBinding>>,
        delivery: Delivery,
    ) -> Self {
        Self {
            subject: delivery.subject,
            reply: delivery.reply,
            payload: delivery.payload,
            headers: delivery.headers,
            context,
            binding,
        }
    }

    // ------------------------------------------------------------------
    // Acknowledgments
    // ------------------------------------------------------------------

    /// Acknowledge the message. On a pull consumer this re-arms the pull
    /// stream instead of sending the literal signal.
    pub async fn ack(&self) -> Result<(), ClientError> {
        self.ack_reply(AckKind::Ack, false).await
    }

    /// Acknowledge and wait for the server's confirmation.
    pub async fn ack_sync(&self) -> Result<(), ClientError> {
        self.ack_reply(AckKind::Ack, true).await
    }

    /// Signal that the message could not be processed.
    pub async fn nak(&self) -> Result<(), ClientError> {
        self.ack_reply(AckKind::Nak, false).await
    }

    /// Signal ongoing work; resets the server's redelivery timer.
    pub async fn in_progress(&self) -> Result<(), ClientError> {
        self.ack_reply(AckKind::InProgress, false).await
    }

    /// Terminate delivery of the message entirely.
    pub async fn term(&self) -> Result<(), ClientError> {
        self.ack_reply(AckKind::Term, false).await
    }

    /// Encode `kind` on the reply subject, honoring pull semantics.
    ///
    /// A missing reply subject is a binding error, never retried.
    async fn ack_reply(&self, kind: AckKind, sync: bool) -> Result<(), ClientError> {
        let reply = self.reply.clone().ok_or(ClientError::NoReplySubject)?;
        let (is_pull, local_subject) = {
            let binding = self.binding.lock().await;
            (binding.is_pull(), binding.local_subject().to_string())
        };
        let transport = self.context.transport();

        if is_pull {
            match kind {
                AckKind::Ack => {
                    transport
                        .publish_with_reply(
                            reply.clone(),
                            local_subject,
                            Bytes::from_static(ACK_NEXT),
                        )
                        .await?;
                }
                // The failed message will not be redelivered inline, so
                // ask for one replacement along with the signal.
                AckKind::Nak | AckKind::Term => {
                    transport
                        .publish_with_reply(
                            reply.clone(),
                            local_subject,
                            Bytes::from_static(ACK_NEXT_ONE),
                        )
                        .await?;
                }
                AckKind::InProgress => {}
            }
            if sync {
                transport
                    .request(reply, None, Bytes::new(), self.context.wait())
                    .await?;
            }
        } else if sync {
            transport
                .request(
                    reply,
                    None,
                    Bytes::from_static(kind.body()),
                    self.context.wait(),
                )
                .await?;
        } else {
            transport
                .publish(reply, Bytes::from_static(kind.body()))
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Decode the delivery metadata carried by the reply subject.
    pub fn metadata(&self) -> Result<DeliveryMetadata, ClientError> {
        let reply = self.reply.as_deref().ok_or(ClientError::NoReplySubject)?;
        DeliveryMetadata::from_reply(reply)
    }
}

/// Flow-control metadata decoded from a delivered message's reply subject.
///
/// Counter fields use `-1` as an "unparseable" sentinel rather than
/// failing the decode; callers must not read the sentinel as a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub delivered: i64,
    pub stream_sequence: i64,
    pub consumer_sequence: i64,
    pub timestamp: DateTime<Utc>,
    pub pending: i64,
}

impl DeliveryMetadata {
    /// Tokenize a JetStream ack reply subject and decode its fields.
    pub fn from_reply(reply: &str) -> Result<Self, ClientError> {
        const EXPECTED_TOKENS: usize = 9;

        let tokens: Vec<&str> = reply.split('.').collect();
        if tokens.len() != EXPECTED_TOKENS || tokens[0] != "$JS" || tokens[1] != "ACK" {
            return Err(ClientError::NotJetStreamMessage);
        }

        Ok(Self {
            delivered: parse_num(tokens[4]),
            stream_sequence: parse_num(tokens[5]),
            consumer_sequence: parse_num(tokens[6]),
            timestamp: DateTime::from_timestamp_nanos(parse_num(tokens[7])),
            pending: parse_num(tokens[8]),
        })
    }
}

/// Lenient parser for the numeric ack-reply tokens: empty tokens and any
/// non-digit character decode to `-1` instead of an error.
fn parse_num(token: &str) -> i64 {
    if token.is_empty() {
        return -1;
    }
    let mut n: i64 = 0;
    for byte in token.bytes() {
        if !byte.is_ascii_digit() {
            return -1;
        }
        n = n * 10 + i64::from(byte - b'0');
    }
    n
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
