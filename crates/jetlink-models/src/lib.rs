//! # JetLink models
//!
//! Serde data model for the JetStream client API: consumer and stream
//! configuration, server-reported snapshots, and the JSON request/response
//! envelopes exchanged with the `$JS.API` endpoints.
//!
//! This crate is pure data — no I/O, no async. The protocol logic that
//! sends and interprets these structures lives in `jetlink-client`.

pub mod api;
pub mod consumer;
pub mod stream;

pub use api::{
    AccountInfo, AccountInfoResponse, ApiError, ConsumerResponse, CreateConsumerRequest,
    NextRequest, PubAck, PubAckResponse, StreamNamesRequest, StreamNamesResponse, StreamResponse,
};
pub use consumer::{
    AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, ReplayPolicy, SequencePair,
};
pub use stream::{RetentionPolicy, StorageType, StreamConfig, StreamInfo, StreamState};
