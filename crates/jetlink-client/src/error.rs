//! Client error types.
//!
//! [`ClientError`] is the single error type returned by every fallible
//! operation in the client. Configuration errors are detected before any
//! remote call; none of the remote failures are retried internally — the
//! caller owns retry policy.

use jetlink_models::ApiError;

use crate::transport::TransportError;

/// Error type for all client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A per-call timeout and a cancellation token were both supplied.
    #[error("configuration error: timeout and cancellation token are mutually exclusive")]
    TimeoutAndCancel,

    /// A pull batch size of zero was requested.
    #[error("configuration error: pull batch size of 0 is not valid")]
    InvalidBatchSize,

    /// Pull consumers deliver on request; a push-style message handler
    /// cannot drive them.
    #[error("configuration error: pull mode is not allowed with a message handler")]
    PullModeNotAllowed,

    /// A direct-mode context cannot create consumers, only attach.
    #[error("direct mode requires attaching to an existing consumer")]
    DirectModeRequired,

    /// The requested subject does not match the consumer's filter subject.
    #[error("subject does not match consumer filter subject")]
    SubjectMismatch,

    /// Subject lookup did not resolve to exactly one stream.
    #[error("no stream matches the subject")]
    NoMatchingStream,

    /// The account has no JetStream responders.
    #[error("JetStream not enabled")]
    JetStreamNotEnabled,

    /// The publish subject has no stream listening behind it.
    #[error("no response from stream")]
    NoStreamResponse,

    /// The publish response was not a usable acknowledgment.
    #[error("invalid publish acknowledgment")]
    InvalidAck,

    /// The message carries no reply subject to acknowledge on.
    #[error("message has no reply subject")]
    NoReplySubject,

    /// The reply subject does not follow the JetStream ack layout.
    #[error("not a JetStream message")]
    NotJetStreamMessage,

    /// The operation is not supported by this kind of subscription.
    #[error("invalid subscription type for this operation")]
    InvalidSubscriptionType,

    /// A management call was issued without a stream name.
    #[error("stream name is required")]
    StreamNameRequired,

    /// The request/response round trip exceeded its wait.
    #[error("request timed out")]
    Timeout,

    /// The caller's cancellation token fired before the response arrived.
    #[error("request canceled")]
    Canceled,

    /// Error payload reported by the server in a response body.
    #[error("server error: {0}")]
    Api(#[from] ApiError),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Malformed request or response body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => ClientError::Timeout,
            other => ClientError::Transport(other),
        }
    }
}
