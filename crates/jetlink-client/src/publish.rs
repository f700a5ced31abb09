//! Acknowledged publishing to a stream.
//!
//! A JetStream publish is a request/response round trip to the target
//! subject: the backing stream answers with a structured acknowledgment
//! carrying the stream name, assigned sequence, and duplicate flag.
//! Deduplication and optimistic-concurrency expectations travel as message
//! headers.

use std::time::Duration;

use async_nats::HeaderMap;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use jetlink_models::{PubAck, PubAckResponse};

use crate::context::JetStreamContext;
use crate::error::ClientError;
use crate::transport::TransportError;

/// Deduplication id header.
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";
/// Expected backing stream header.
pub const EXPECTED_STREAM_HEADER: &str = "Nats-Expected-Stream";
/// Expected last stream sequence header.
pub const EXPECTED_LAST_SEQUENCE_HEADER: &str = "Nats-Expected-Last-Sequence";
/// Expected last deduplication id header.
pub const EXPECTED_LAST_MSG_ID_HEADER: &str = "Nats-Expected-Last-Msg-Id";

/// Options for a single acknowledged publish.
///
/// A per-call `timeout` and a `cancel` token are mutually exclusive; when
/// neither is given the context-level wait bounds the round trip.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    msg_id: Option<String>,
    expected_stream: Option<String>,
    expected_last_sequence: Option<u64>,
    expected_last_msg_id: Option<String>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl PublishOptions {
    /// Set the message id used for deduplication.
    pub fn msg_id(mut self, id: impl Into<String>) -> Self {
        self.msg_id = Some(id.into());
        self
    }

    /// Require the publish to land on this stream.
    pub fn expect_stream(mut self, stream: impl Into<String>) -> Self {
        self.expected_stream = Some(stream.into());
        self
    }

    /// Require the stream's last sequence to match before appending.
    pub fn expect_last_sequence(mut self, sequence: u64) -> Self {
        self.expected_last_sequence = Some(sequence);
        self
    }

    /// Require the stream's last message id to match before appending.
    pub fn expect_last_msg_id(mut self, id: impl Into<String>) -> Self {
        self.expected_last_msg_id = Some(id.into());
        self
    }

    /// Per-call response deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancellation token aborting the wait for the acknowledgment.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn headers(&self) -> Option<HeaderMap> {
        if self.msg_id.is_none()
            && self.expected_stream.is_none()
            && self.expected_last_sequence.is_none()
            && self.expected_last_msg_id.is_none()
        {
            return None;
        }

        let mut headers = HeaderMap::new();
        if let Some(id) = &self.msg_id {
            headers.insert(MSG_ID_HEADER, id.as_str());
        }
        if let Some(stream) = &self.expected_stream {
            headers.insert(EXPECTED_STREAM_HEADER, stream.as_str());
        }
        if let Some(sequence) = self.expected_last_sequence {
            headers.insert(EXPECTED_LAST_SEQUENCE_HEADER, sequence.to_string().as_str());
        }
        if let Some(id) = &self.expected_last_msg_id {
            headers.insert(EXPECTED_LAST_MSG_ID_HEADER, id.as_str());
        }
        Some(headers)
    }
}

impl JetStreamContext {
    /// Publish to `subject` and wait for the stream's acknowledgment.
    pub async fn publish(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
    ) -> Result<PubAck, ClientError> {
        self.publish_with_options(subject, payload, PublishOptions::default())
            .await
    }

    /// Publish with deduplication/expectation headers and an explicit
    /// deadline or cancellation token.
    ///
    /// Failure modes: no responders behind the subject maps to
    /// [`ClientError::NoStreamResponse`]; a response that does not decode,
    /// carries a server error, or names neither a stream nor a nonzero
    /// sequence leaves the publish unconfirmed with
    /// [`ClientError::InvalidAck`] or the server's error.
    pub async fn publish_with_options(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        options: PublishOptions,
    ) -> Result<PubAck, ClientError> {
        if options.timeout.is_some() && options.cancel.is_some() {
            return Err(ClientError::TimeoutAndCancel);
        }
        let wait = options.timeout.unwrap_or_else(|| self.wait());
        let headers = options.headers();

        let request = self
            .transport()
            .request(subject.to_string(), headers, payload.into(), wait);
        let result = match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => return Err(ClientError::Canceled),
                result = request => result,
            },
            None => request.await,
        };

        let response = result.map_err(|e| match e {
            TransportError::NoResponders => ClientError::NoStreamResponse,
            other => other.into(),
        })?;

        let decoded: PubAckResponse =
            serde_json::from_slice(&response.payload).map_err(|_| ClientError::InvalidAck)?;
        if let Some(error) = decoded.error {
            return Err(ClientError::Api(error));
        }
        if decoded.ack.stream.is_empty() && decoded.ack.sequence == 0 {
            return Err(ClientError::InvalidAck);
        }

        debug!(
            stream = %decoded.ack.stream,
            sequence = decoded.ack.sequence,
            duplicate = decoded.ack.duplicate,
            "publish acknowledged"
        );
        Ok(decoded.ack)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
