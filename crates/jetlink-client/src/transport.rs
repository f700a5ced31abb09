//! Messaging substrate abstraction.
//!
//! The protocol engine only needs four services from its transport:
//! request/response with a distinguishable no-responders signal,
//! fire-and-forget publish (optionally carrying a reply subject), and
//! subject subscriptions with queue-group support. [`NatsTransport`] is the
//! production implementation over [`async_nats::Client`]; tests drive the
//! engine through a recording mock behind the same trait.

use std::time::Duration;

use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

/// A raw message handed up by the transport.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
}

impl From<async_nats::Message> for Delivery {
    fn from(message: async_nats::Message) -> Self {
        Self {
            subject: message.subject.to_string(),
            reply: message.reply.map(|r| r.to_string()),
            payload: message.payload,
            headers: message.headers,
        }
    }
}

/// Transport-level failure, kept separate from protocol errors so the
/// engine can translate no-responders contextually.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No subscriber answered the request subject.
    #[error("no responders")]
    NoResponders,

    /// The round trip did not complete within the allotted wait.
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Request/reply messaging substrate required by the protocol engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Single request/response round trip bounded by `timeout`.
    async fn request(
        &self,
        subject: String,
        headers: Option<HeaderMap>,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Delivery, TransportError>;

    /// Fire-and-forget publish.
    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), TransportError>;

    /// Publish carrying an explicit reply subject.
    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), TransportError>;

    /// Establish a subscription, optionally inside a queue group.
    async fn subscribe(
        &self,
        subject: String,
        queue: Option<String>,
    ) -> Result<Box<dyn Mailbox>, TransportError>;
}

/// Receiving side of an established subscription.
#[async_trait]
pub trait Mailbox: Send {
    /// Next delivered message, or `None` once the subscription closes.
    async fn recv(&mut self) -> Option<Delivery>;

    /// Tear the subscription down; `recv` drains and then returns `None`.
    async fn unsubscribe(&mut self) -> Result<(), TransportError>;
}

/// Production transport over a connected [`async_nats::Client`].
#[derive(Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
}

impl NatsTransport {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    /// Access the wrapped NATS client for operations outside this engine.
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn request(
        &self,
        subject: String,
        headers: Option<HeaderMap>,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Delivery, TransportError> {
        let mut request = async_nats::Request::new()
            .payload(payload)
            .timeout(Some(timeout));
        if let Some(headers) = headers {
            request = request.headers(headers);
        }

        match self.client.send_request(subject, request).await {
            Ok(message) => Ok(message.into()),
            Err(e) => Err(match e.kind() {
                async_nats::RequestErrorKind::NoResponders => TransportError::NoResponders,
                async_nats::RequestErrorKind::TimedOut => TransportError::Timeout,
                async_nats::RequestErrorKind::Other => TransportError::Other(e.to_string()),
            }),
        }
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(subject, payload)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        self.client
            .publish_with_reply(subject, reply, payload)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn subscribe(
        &self,
        subject: String,
        queue: Option<String>,
    ) -> Result<Box<dyn Mailbox>, TransportError> {
        let subscriber = match queue {
            Some(group) => self.client.queue_subscribe(subject, group).await,
            None => self.client.subscribe(subject).await,
        }
        .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Box::new(NatsMailbox { subscriber }))
    }
}

struct NatsMailbox {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Mailbox for NatsMailbox {
    async fn recv(&mut self) -> Option<Delivery> {
        self.subscriber.next().await.map(Delivery::from)
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}
