//! Canonical JetStream API subject construction.
//!
//! All API subject strings used by the engine **must** be built through
//! [`ApiSubjects`], so the prefix convention is defined in exactly one
//! place. The prefix defaults to [`DEFAULT_API_PREFIX`] and can be
//! overridden for imported JetStream domains; an empty prefix passes
//! suffixes through unchanged.
//!
//! # Subject layout
//!
//! ```text
//! $JS.API.INFO                                     ← account info
//! $JS.API.STREAM.NAMES                             ← stream lookup by subject
//! $JS.API.STREAM.CREATE.{stream}                   ← stream create
//! $JS.API.STREAM.INFO.{stream}                     ← stream info
//! $JS.API.CONSUMER.CREATE.{stream}                 ← ephemeral consumer create
//! $JS.API.CONSUMER.DURABLE.CREATE.{stream}.{name}  ← durable consumer create
//! $JS.API.CONSUMER.INFO.{stream}.{consumer}        ← consumer info
//! $JS.API.CONSUMER.MSG.NEXT.{stream}.{consumer}    ← pull next-message request
//! ```

use uuid::Uuid;

/// Default JetStream API prefix.
pub const DEFAULT_API_PREFIX: &str = "$JS.API.";

/// Central authority for JetStream API subject names.
#[derive(Debug, Clone)]
pub struct ApiSubjects {
    prefix: String,
}

impl Default for ApiSubjects {
    fn default() -> Self {
        Self::new(DEFAULT_API_PREFIX)
    }
}

impl ApiSubjects {
    /// Build a router with the given prefix. A non-empty prefix is
    /// normalized to end with `.`; an empty prefix disables prefixing.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('.') {
            prefix.push('.');
        }
        Self { prefix }
    }

    /// The normalized prefix in use.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prepend the prefix to an API suffix.
    pub fn api(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}{suffix}", self.prefix)
        }
    }

    // ------------------------------------------------------------------
    // Account / stream endpoints
    // ------------------------------------------------------------------

    pub fn account_info(&self) -> String {
        self.api("INFO")
    }

    pub fn stream_names(&self) -> String {
        self.api("STREAM.NAMES")
    }

    pub fn stream_create(&self, stream: &str) -> String {
        self.api(&format!("STREAM.CREATE.{stream}"))
    }

    pub fn stream_info(&self, stream: &str) -> String {
        self.api(&format!("STREAM.INFO.{stream}"))
    }

    // ------------------------------------------------------------------
    // Consumer endpoints
    // ------------------------------------------------------------------

    pub fn consumer_create(&self, stream: &str) -> String {
        self.api(&format!("CONSUMER.CREATE.{stream}"))
    }

    pub fn durable_create(&self, stream: &str, durable: &str) -> String {
        self.api(&format!("CONSUMER.DURABLE.CREATE.{stream}.{durable}"))
    }

    pub fn consumer_info(&self, stream: &str, consumer: &str) -> String {
        self.api(&format!("CONSUMER.INFO.{stream}.{consumer}"))
    }

    pub fn next_request(&self, stream: &str, consumer: &str) -> String {
        self.api(&format!("CONSUMER.MSG.NEXT.{stream}.{consumer}"))
    }
}

/// Generate a unique local inbox subject for deliveries and replies.
pub fn new_inbox() -> String {
    format!("_INBOX.{}", Uuid::new_v4().simple())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
