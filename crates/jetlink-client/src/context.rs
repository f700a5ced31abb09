//! The JetStream context: configuration, the account gate, and the
//! management API.
//!
//! [`JetStreamContext`] owns the transport handle, the subject router, and
//! the per-context request wait. Every public operation is a single
//! request/response round trip bounded by that wait; nothing is retried
//! here. A *direct* context skips the account check and talks only to
//! pre-existing consumers — it can never create streams or consumers.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use jetlink_models::{
    AccountInfo, AccountInfoResponse, ConsumerConfig, ConsumerInfo, ConsumerResponse,
    CreateConsumerRequest, StreamConfig, StreamInfo, StreamNamesRequest, StreamNamesResponse,
    StreamResponse,
};

use crate::error::ClientError;
use crate::subjects::{ApiSubjects, DEFAULT_API_PREFIX};
use crate::transport::{Delivery, Transport, TransportError};

/// Default wait for API request/response round trips.
pub const DEFAULT_API_WAIT: Duration = Duration::from_secs(5);

/// Configuration for building a [`JetStreamContext`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    prefix: String,
    wait: Duration,
    direct: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_API_PREFIX.to_string(),
            wait: DEFAULT_API_WAIT,
            direct: false,
        }
    }
}

impl ContextOptions {
    /// Override the API prefix (for imported JetStream domains).
    /// Non-empty prefixes are normalized to end with `.`.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Maximum wait for each API request/response round trip.
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Direct access only: skip the account check and disable the
    /// management API. Subscriptions may only attach, never create.
    pub fn direct_only(mut self) -> Self {
        self.direct = true;
        self
    }
}

/// Client-side JetStream protocol engine over a request/reply transport.
///
/// Cheap to clone; clones share the same transport handle.
#[derive(Clone)]
pub struct JetStreamContext {
    transport: Arc<dyn Transport>,
    subjects: ApiSubjects,
    wait: Duration,
    direct: bool,
}

impl JetStreamContext {
    /// Build a context over `transport`.
    ///
    /// Unless the context is direct, this performs the account `INFO`
    /// round trip up front; an account without JetStream responders (or
    /// one answering with a 503 error payload) fails with
    /// [`ClientError::JetStreamNotEnabled`].
    pub async fn new(
        transport: Arc<dyn Transport>,
        options: ContextOptions,
    ) -> Result<Self, ClientError> {
        let context = Self {
            transport,
            subjects: ApiSubjects::new(options.prefix),
            wait: options.wait,
            direct: options.direct,
        };

        if context.direct {
            return Ok(context);
        }

        let info = context.account_info().await?;
        debug!(
            streams = info.streams,
            consumers = info.consumers,
            "verified JetStream account"
        );
        Ok(context)
    }

    // ------------------------------------------------------------------
    // Account / stream management
    // ------------------------------------------------------------------

    /// Fetch account-level JetStream usage.
    pub async fn account_info(&self) -> Result<AccountInfo, ClientError> {
        let response = self
            .api_request(self.subjects.account_info(), Vec::new())
            .await?;
        let decoded: AccountInfoResponse = serde_json::from_slice(&response.payload)?;
        if let Some(error) = decoded.error {
            if error.code == 503 {
                return Err(ClientError::JetStreamNotEnabled);
            }
            return Err(ClientError::Api(error));
        }
        Ok(decoded.info)
    }

    /// Create a stream from the given configuration.
    pub async fn add_stream(&self, config: &StreamConfig) -> Result<StreamInfo, ClientError> {
        if config.name.is_empty() {
            return Err(ClientError::StreamNameRequired);
        }
        let body = serde_json::to_vec(config)?;
        let response = self
            .api_request(self.subjects.stream_create(&config.name), body)
            .await?;
        Self::decode_stream_response(&response)
    }

    /// Fetch a stream snapshot by name.
    pub async fn stream_info(&self, stream: &str) -> Result<StreamInfo, ClientError> {
        if stream.is_empty() {
            return Err(ClientError::StreamNameRequired);
        }
        let response = self
            .api_request(self.subjects.stream_info(stream), Vec::new())
            .await?;
        Self::decode_stream_response(&response)
    }

    /// Resolve the single stream serving `subject`.
    ///
    /// The server must report exactly one matching stream name; anything
    /// else is [`ClientError::NoMatchingStream`].
    pub async fn lookup_stream_by_subject(&self, subject: &str) -> Result<String, ClientError> {
        let body = serde_json::to_vec(&StreamNamesRequest {
            subject: Some(subject.to_string()),
        })?;
        let response = self.api_request(self.subjects.stream_names(), body).await?;
        let decoded: StreamNamesResponse = serde_json::from_slice(&response.payload)?;
        if decoded.error.is_some() {
            return Err(ClientError::NoMatchingStream);
        }
        match decoded.streams.as_deref() {
            Some([stream]) => Ok(stream.clone()),
            _ => Err(ClientError::NoMatchingStream),
        }
    }

    // ------------------------------------------------------------------
    // Consumer management
    // ------------------------------------------------------------------

    /// Create a consumer on `stream`; durable when the configuration
    /// carries a durable name, ephemeral otherwise.
    pub async fn add_consumer(
        &self,
        stream: &str,
        config: &ConsumerConfig,
    ) -> Result<ConsumerInfo, ClientError> {
        if stream.is_empty() {
            return Err(ClientError::StreamNameRequired);
        }
        let request = CreateConsumerRequest {
            stream: stream.to_string(),
            config: config.clone(),
        };
        let body = serde_json::to_vec(&request)?;
        let subject = match config.durable_name.as_deref() {
            Some(durable) => self.subjects.durable_create(stream, durable),
            None => self.subjects.consumer_create(stream),
        };
        let response = self.api_request(subject, body).await?;
        Self::decode_consumer_response(&response)
    }

    /// Fetch a consumer snapshot by stream and consumer name.
    pub async fn consumer_info(
        &self,
        stream: &str,
        consumer: &str,
    ) -> Result<ConsumerInfo, ClientError> {
        let response = self
            .api_request(self.subjects.consumer_info(stream, consumer), Vec::new())
            .await?;
        Self::decode_consumer_response(&response)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// API round trip with the context-level no-responders translation:
    /// nobody serving the API subjects means JetStream is not enabled.
    pub(crate) async fn api_request(
        &self,
        subject: String,
        payload: Vec<u8>,
    ) -> Result<Delivery, ClientError> {
        self.transport
            .request(subject, None, Bytes::from(payload), self.wait)
            .await
            .map_err(|e| match e {
                TransportError::NoResponders => ClientError::JetStreamNotEnabled,
                other => other.into(),
            })
    }

    fn decode_consumer_response(response: &Delivery) -> Result<ConsumerInfo, ClientError> {
        let decoded: ConsumerResponse = serde_json::from_slice(&response.payload)?;
        if let Some(error) = decoded.error {
            return Err(ClientError::Api(error));
        }
        Ok(decoded.info)
    }

    fn decode_stream_response(response: &Delivery) -> Result<StreamInfo, ClientError> {
        let decoded: StreamResponse = serde_json::from_slice(&response.payload)?;
        if let Some(error) = decoded.error {
            return Err(ClientError::Api(error));
        }
        Ok(decoded.info)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn subjects(&self) -> &ApiSubjects {
        &self.subjects
    }

    pub(crate) fn wait(&self) -> Duration {
        self.wait
    }

    pub(crate) fn is_direct(&self) -> bool {
        self.direct
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
