//! # JetLink client
//!
//! Client-side JetStream protocol engine: acknowledged publishing,
//! consumer management, and subject-based subscription binding over a
//! request/reply messaging transport.
//!
//! The engine provides:
//!
//! * [`JetStreamContext`] — the entry point: account verification,
//!   stream/consumer management, publishing, and subscribing.
//! * [`Subscription`] — a local subscription bound to a remote
//!   consumer, in push or pull mode.
//! * [`JsMessage`] — a delivered message with acknowledgment signals
//!   and reply-subject delivery metadata.
//! * [`Transport`] — the seam to the messaging substrate, implemented
//!   for [`async_nats::Client`] by [`NatsTransport`].
//!
//! Wire-level request and response types live in [`jetlink_models`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jetlink_client::{ContextOptions, JetStreamContext, NatsTransport, SubscribeOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let nats = async_nats::connect("nats://localhost:4222").await?;
//! let context = JetStreamContext::new(
//!     Arc::new(NatsTransport::new(nats)),
//!     ContextOptions::default(),
//! ).await?;
//!
//! let ack = context.publish("orders.created", "order body").await?;
//! println!("stored as {}:{}", ack.stream, ack.sequence);
//!
//! let mut subscription = context
//!     .subscribe("orders.created", SubscribeOptions::default().durable("dispatch"))
//!     .await?;
//! while let Some(message) = subscription.next().await? {
//!     message.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod message;
pub mod publish;
pub mod subjects;
pub mod subscribe;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{ContextOptions, JetStreamContext, DEFAULT_API_WAIT};
pub use error::ClientError;
pub use message::{AckKind, DeliveryMetadata, JsMessage};
pub use publish::{PublishOptions, MSG_ID_HEADER};
pub use subjects::{new_inbox, ApiSubjects, DEFAULT_API_PREFIX};
pub use subscribe::{
    ConsumerBinding, SubscribeOptions, Subscription, DEFAULT_PENDING_MSGS_LIMIT,
};
pub use transport::{Delivery, Mailbox, NatsTransport, Transport, TransportError};

// Re-export the wire types so callers need only one crate.
pub use jetlink_models::{
    AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, PubAck, ReplayPolicy, StorageType,
    StreamConfig, StreamInfo, StreamState,
};
