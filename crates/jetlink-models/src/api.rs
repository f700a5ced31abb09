//! Request and response envelopes for the JetStream JSON API.
//!
//! Every API response may carry an [`ApiError`] alongside (or instead of)
//! its payload, so each envelope pairs an optional `error` with defaulted
//! payload fields flattened at the top level. Callers check `error` first
//! and only then trust the payload.

use serde::{Deserialize, Serialize};

use crate::consumer::{ConsumerConfig, ConsumerInfo};
use crate::stream::StreamInfo;

/// Structured error payload embedded in API responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{description}")]
pub struct ApiError {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub description: String,
}

/// Account-level JetStream usage, returned by the `INFO` endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub memory: u64,
    #[serde(default)]
    pub storage: u64,
    #[serde(default)]
    pub streams: u64,
    #[serde(default)]
    pub consumers: u64,
}

/// Response envelope for the `INFO` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfoResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub info: AccountInfo,
}

/// Body of a create-consumer request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    #[serde(rename = "stream_name")]
    pub stream: String,
    pub config: ConsumerConfig,
}

/// Response envelope shared by consumer create and info endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub info: ConsumerInfo,
}

/// Body of a stream lookup-by-subject request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamNamesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Response envelope for the `STREAM.NAMES` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamNamesResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub streams: Option<Vec<String>>,
}

/// Response envelope shared by stream create and info endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub info: StreamInfo,
}

/// Server confirmation of a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubAck {
    #[serde(default)]
    pub stream: String,
    #[serde(rename = "seq", default)]
    pub sequence: u64,
    #[serde(default)]
    pub duplicate: bool,
}

/// Response envelope for a publish request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PubAckResponse {
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(flatten)]
    pub ack: PubAck,
}

/// Body of a pull next-message batch request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NextRequest {
    pub batch: usize,
}
