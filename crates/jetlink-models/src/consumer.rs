//! Consumer configuration and server-reported consumer state.
//!
//! Field names and value spellings follow the JetStream JSON API exactly:
//! policies serialize as snake_case strings, durations as nanosecond
//! integers. [`ConsumerConfig`] is the immutable value sent with a
//! create-consumer request; [`ConsumerInfo`] is the server-resolved snapshot
//! echoed back, fetched on demand and never cached.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where in the stream a new consumer starts delivering from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverPolicy {
    /// Deliver every message available in the stream.
    #[default]
    All,
    /// Start with the last message received.
    Last,
    /// Only deliver messages published after the consumer was created.
    New,
    /// Start at an explicit stream sequence (`opt_start_seq`).
    ByStartSequence,
    /// Start at an explicit point in time (`opt_start_time`).
    ByStartTime,
}

/// How deliveries must be acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// No acknowledgments expected.
    #[default]
    None,
    /// Acknowledging a message acknowledges everything before it.
    All,
    /// Every delivered message must be acknowledged individually.
    Explicit,
}

/// Replay pacing for deliveries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Deliver as fast as possible.
    #[default]
    Instant,
    /// Deliver at the original publish pacing.
    Original,
}

/// Configuration sent with a create-consumer request.
///
/// Optional fields are omitted from the wire form when unset, matching the
/// server's `omitempty` expectations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_subject: Option<String>,
    #[serde(default)]
    pub deliver_policy: DeliverPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ack_policy: AckPolicy,
    /// Redelivery window, serialized as integer nanoseconds.
    #[serde(default, with = "opt_nanos", skip_serializing_if = "Option::is_none")]
    pub ack_wait: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deliver: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_subject: Option<String>,
    #[serde(default)]
    pub replay_policy: ReplayPolicy,
    /// Delivery rate limit in bits per second.
    #[serde(rename = "rate_limit_bps", default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,
    #[serde(rename = "sample_freq", default, skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_waiting: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ack_pending: Option<i64>,
}

/// A delivered/acknowledged position, as a stream and consumer sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePair {
    #[serde(rename = "consumer_seq", default)]
    pub consumer: u64,
    #[serde(rename = "stream_seq", default)]
    pub stream: u64,
}

/// Server-reported consumer identity and flow-control counters.
///
/// Every field is defaulted on decode: consumer API responses share one
/// envelope with error replies, so the snapshot fields may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    #[serde(rename = "stream_name", default)]
    pub stream: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub config: ConsumerConfig,
    #[serde(default)]
    pub delivered: SequencePair,
    #[serde(default)]
    pub ack_floor: SequencePair,
    #[serde(default)]
    pub num_ack_pending: i64,
    #[serde(default)]
    pub num_redelivered: i64,
    #[serde(default)]
    pub num_waiting: i64,
    #[serde(default)]
    pub num_pending: u64,
}

/// Serde adapter for `Option<Duration>` as integer nanoseconds.
mod opt_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let nanos: Option<i64> = Option::deserialize(deserializer)?;
        Ok(nanos.map(|n| Duration::from_nanos(u64::try_from(n).unwrap_or(0))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_wire_field_names() {
        let cfg = ConsumerConfig {
            durable_name: Some("workers".into()),
            deliver_subject: Some("_INBOX.abc".into()),
            ack_policy: AckPolicy::Explicit,
            ack_wait: Some(Duration::from_secs(30)),
            filter_subject: Some("orders.created".into()),
            rate_limit: Some(1024),
            max_ack_pending: Some(65_536),
            ..ConsumerConfig::default()
        };

        let json: serde_json::Value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["durable_name"], "workers");
        assert_eq!(json["deliver_policy"], "all");
        assert_eq!(json["ack_policy"], "explicit");
        assert_eq!(json["ack_wait"], 30_000_000_000_i64);
        assert_eq!(json["replay_policy"], "instant");
        assert_eq!(json["rate_limit_bps"], 1024);
        assert_eq!(json["max_ack_pending"], 65_536);
        // Unset optionals must be omitted entirely.
        assert!(json.get("opt_start_seq").is_none());
        assert!(json.get("max_deliver").is_none());
        assert!(json.get("sample_freq").is_none());
    }

    #[test]
    fn deliver_policy_start_positions() {
        let cfg = ConsumerConfig {
            deliver_policy: DeliverPolicy::ByStartSequence,
            opt_start_seq: Some(42),
            ..ConsumerConfig::default()
        };
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["deliver_policy"], "by_start_sequence");
        assert_eq!(json["opt_start_seq"], 42);
    }

    #[test]
    fn consumer_info_decodes_server_snapshot() {
        let body = r#"{
            "stream_name": "ORDERS",
            "name": "dispatch",
            "created": "2026-01-05T10:00:00Z",
            "config": {"durable_name": "dispatch", "deliver_policy": "all",
                       "ack_policy": "explicit", "replay_policy": "instant"},
            "delivered": {"consumer_seq": 10, "stream_seq": 12},
            "ack_floor": {"consumer_seq": 8, "stream_seq": 10},
            "num_ack_pending": 2,
            "num_redelivered": 1,
            "num_pending": 5
        }"#;

        let info: ConsumerInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.stream, "ORDERS");
        assert_eq!(info.name, "dispatch");
        assert_eq!(info.config.durable_name.as_deref(), Some("dispatch"));
        assert_eq!(info.delivered.stream, 12);
        assert_eq!(info.ack_floor.consumer, 8);
        assert_eq!(info.num_ack_pending, 2);
        assert_eq!(info.num_pending, 5);
        // Absent counter defaults rather than failing the decode.
        assert_eq!(info.num_waiting, 0);
    }

    #[test]
    fn ack_wait_round_trips_through_nanos() {
        let cfg = ConsumerConfig {
            ack_wait: Some(Duration::from_millis(1500)),
            ..ConsumerConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ConsumerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ack_wait, Some(Duration::from_millis(1500)));
    }
}
