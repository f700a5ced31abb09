//! Binding subject subscriptions to streams and consumers.
//!
//! One `subscribe` call resolves into a live local subscription correctly
//! wired to a remote consumer. The binder decides between three paths:
//!
//! * **attach** — the caller named an existing stream+consumer pair, or
//!   supplied an explicit push deliver subject;
//! * **create** — otherwise: resolve the stream by subject lookup and
//!   create an ephemeral or durable consumer;
//! * **direct** — on a direct-mode context only attaching is allowed.
//!
//! The local transport subscription is always established *before* the
//! remote create request, so every post-subscribe failure can cleanly
//! unwind with an unsubscribe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use jetlink_models::{AckPolicy, ConsumerConfig, ConsumerInfo, DeliverPolicy, NextRequest};

use crate::context::JetStreamContext;
use crate::error::ClientError;
use crate::message::JsMessage;
use crate::subjects::new_inbox;
use crate::transport::Mailbox;

/// Default per-subscription pending-message limit, inherited as
/// `max_ack_pending` when acks are enabled and no explicit limit is set.
pub const DEFAULT_PENDING_MSGS_LIMIT: i64 = 65_536;

/// Callback invoked for each delivered message on handler subscriptions.
pub type MessageHandler = Arc<dyn Fn(JsMessage) + Send + Sync>;

/// Options for binding a subscription to a stream and consumer.
///
/// An explicit, fully-enumerated configuration record: every setter is a
/// pure field assignment, validated once at bind time.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    durable: Option<String>,
    bind_stream: Option<String>,
    bind_consumer: Option<String>,
    deliver_subject: Option<String>,
    pull_batch: Option<usize>,
    manual_ack: bool,
    deliver_policy: Option<DeliverPolicy>,
    opt_start_seq: Option<u64>,
    opt_start_time: Option<DateTime<Utc>>,
    ack_policy: Option<AckPolicy>,
    ack_wait: Option<std::time::Duration>,
    max_deliver: Option<i64>,
    max_ack_pending: Option<i64>,
    rate_limit: Option<u64>,
}

impl SubscribeOptions {
    /// Name the consumer durably so it survives client disconnects.
    pub fn durable(mut self, name: impl Into<String>) -> Self {
        self.durable = Some(name.into());
        self
    }

    /// Attach to an existing consumer instead of creating one.
    pub fn bind(mut self, stream: impl Into<String>, consumer: impl Into<String>) -> Self {
        self.bind_stream = Some(stream.into());
        self.bind_consumer = Some(consumer.into());
        self
    }

    /// Pull mode with the given batch size. A batch of zero fails the
    /// bind with a configuration error.
    pub fn pull(mut self, batch: usize) -> Self {
        self.pull_batch = Some(batch);
        self
    }

    /// Attach to an existing pull consumer.
    pub fn bind_pull(
        self,
        stream: impl Into<String>,
        consumer: impl Into<String>,
        batch: usize,
    ) -> Self {
        self.bind(stream, consumer).pull(batch)
    }

    /// Attach to a consumer already delivering on `subject` (push mode;
    /// the consumer is presumed to exist).
    pub fn deliver_subject(mut self, subject: impl Into<String>) -> Self {
        self.deliver_subject = Some(subject.into());
        self
    }

    /// Disable auto-acknowledgment of handler deliveries.
    pub fn manual_ack(mut self) -> Self {
        self.manual_ack = true;
        self
    }

    /// Receive every message available in the stream.
    pub fn deliver_all(mut self) -> Self {
        self.deliver_policy = Some(DeliverPolicy::All);
        self
    }

    /// Start with the last message received.
    pub fn deliver_last(mut self) -> Self {
        self.deliver_policy = Some(DeliverPolicy::Last);
        self
    }

    /// Only receive messages published after the subscription.
    pub fn deliver_new(mut self) -> Self {
        self.deliver_policy = Some(DeliverPolicy::New);
        self
    }

    /// Start delivering from an explicit stream sequence.
    pub fn start_sequence(mut self, sequence: u64) -> Self {
        self.deliver_policy = Some(DeliverPolicy::ByStartSequence);
        self.opt_start_seq = Some(sequence);
        self
    }

    /// Start delivering from an explicit point in time.
    pub fn start_time(mut self, start: DateTime<Utc>) -> Self {
        self.deliver_policy = Some(DeliverPolicy::ByStartTime);
        self.opt_start_time = Some(start);
        self
    }

    /// Acknowledgment policy; defaults to explicit on the create path.
    pub fn ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = Some(policy);
        self
    }

    /// Redelivery window for unacknowledged messages.
    pub fn ack_wait(mut self, wait: std::time::Duration) -> Self {
        self.ack_wait = Some(wait);
        self
    }

    /// Delivery attempt budget per message.
    pub fn max_deliver(mut self, attempts: i64) -> Self {
        self.max_deliver = Some(attempts);
        self
    }

    /// Cap on outstanding unacknowledged deliveries.
    pub fn max_ack_pending(mut self, pending: i64) -> Self {
        self.max_ack_pending = Some(pending);
        self
    }

    /// Delivery rate limit in bits per second.
    pub fn rate_limit(mut self, bits_per_second: u64) -> Self {
        self.rate_limit = Some(bits_per_second);
        self
    }
}

/// Per-subscription binding state: which stream/consumer the subscription
/// is wired to and how deliveries flow.
///
/// Invariant: a pull binding never has a deliver subject and always has a
/// nonzero batch; a push binding is the exact opposite.
#[derive(Debug, Clone, Default)]
pub struct ConsumerBinding {
    stream: String,
    consumer: String,
    deliver_subject: Option<String>,
    pull_batch: usize,
    local_subject: String,
}

impl ConsumerBinding {
    pub(crate) fn new(
        stream: String,
        consumer: String,
        deliver_subject: Option<String>,
        pull_batch: usize,
        local_subject: String,
    ) -> Self {
        Self {
            stream,
            consumer,
            deliver_subject,
            pull_batch,
            local_subject,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// The consumer's remote deliver subject; `None` for pull consumers.
    pub fn deliver_subject(&self) -> Option<&str> {
        self.deliver_subject.as_deref()
    }

    /// Pull batch size; `0` for push consumers.
    pub fn pull_batch(&self) -> usize {
        self.pull_batch
    }

    pub fn is_pull(&self) -> bool {
        self.deliver_subject.is_none() && self.pull_batch > 0
    }

    /// Subject of the local transport subscription, used as the reply
    /// address for pull requests.
    pub(crate) fn local_subject(&self) -> &str {
        &self.local_subject
    }
}

impl JetStreamContext {
    /// Bind a subscription to `subject`; messages are read with
    /// [`Subscription::next`].
    pub async fn subscribe(
        &self,
        subject: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, ClientError> {
        self.bind_subscription(subject, None, None, options).await
    }

    /// Bind with queue-group semantics on the local subscription.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        queue: &str,
        options: SubscribeOptions,
    ) -> Result<Subscription, ClientError> {
        self.bind_subscription(subject, Some(queue), None, options)
            .await
    }

    /// Bind and invoke `handler` for every delivered message. Unless
    /// manual ack was requested, each message is acknowledged right after
    /// the handler returns. Handlers imply push delivery: combining one
    /// with pull mode is a configuration error.
    pub async fn subscribe_with_handler<F>(
        &self,
        subject: &str,
        handler: F,
        options: SubscribeOptions,
    ) -> Result<Subscription, ClientError>
    where
        F: Fn(JsMessage) + Send + Sync + 'static,
    {
        self.bind_subscription(subject, None, Some(Arc::new(handler)), options)
            .await
    }

    /// Handler variant of [`queue_subscribe`](Self::queue_subscribe).
    pub async fn queue_subscribe_with_handler<F>(
        &self,
        subject: &str,
        queue: &str,
        handler: F,
        options: SubscribeOptions,
    ) -> Result<Subscription, ClientError>
    where
        F: Fn(JsMessage) + Send + Sync + 'static,
    {
        self.bind_subscription(subject, Some(queue), Some(Arc::new(handler)), options)
            .await
    }

    /// The binder: resolve one subscribe call into a bound subscription.
    async fn bind_subscription(
        &self,
        subject: &str,
        queue: Option<&str>,
        handler: Option<MessageHandler>,
        options: SubscribeOptions,
    ) -> Result<Subscription, ClientError> {
        let pull_batch = match options.pull_batch {
            Some(0) => return Err(ClientError::InvalidBatchSize),
            Some(batch) => batch,
            None => 0,
        };
        let is_pull = pull_batch > 0;
        if is_pull && handler.is_some() {
            return Err(ClientError::PullModeNotAllowed);
        }

        // Attach when the caller named an existing stream+consumer pair or
        // supplied an explicit push deliver subject; create otherwise.
        let should_attach = (options.bind_stream.is_some() && options.bind_consumer.is_some())
            || options.deliver_subject.is_some();
        let should_create = !should_attach;

        if self.is_direct() && should_create {
            return Err(ClientError::DirectModeRequired);
        }

        let mut config = ConsumerConfig {
            durable_name: options.durable.clone(),
            deliver_policy: options.deliver_policy.unwrap_or_default(),
            opt_start_seq: options.opt_start_seq,
            opt_start_time: options.opt_start_time,
            ack_wait: options.ack_wait,
            max_deliver: options.max_deliver,
            rate_limit: options.rate_limit,
            max_ack_pending: options.max_ack_pending,
            ..ConsumerConfig::default()
        };

        let mut stream = String::new();
        let mut attached_config: Option<ConsumerConfig> = None;

        let deliver = if self.is_direct() {
            options.deliver_subject.clone().unwrap_or_else(new_inbox)
        } else if should_attach {
            let info = self
                .consumer_info(
                    options.bind_stream.as_deref().unwrap_or_default(),
                    options.bind_consumer.as_deref().unwrap_or_default(),
                )
                .await?;
            // The requested subject must match (or the consumer must be
            // unfiltered); a mismatch never creates anything.
            if let Some(filter) = info.config.filter_subject.as_deref() {
                if !filter.is_empty() && filter != subject {
                    return Err(ClientError::SubjectMismatch);
                }
            }
            let deliver = info
                .config
                .deliver_subject
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(new_inbox);
            attached_config = Some(info.config);
            deliver
        } else {
            stream = self.lookup_stream_by_subject(subject).await?;
            let inbox = new_inbox();
            if !is_pull {
                config.deliver_subject = Some(inbox.clone());
            }
            // Always filter; the server clears it when not applicable.
            config.filter_subject = Some(subject.to_string());
            inbox
        };

        // Local subscription before any remote create, so in-flight
        // create failures can cleanly unsubscribe.
        let mut mailbox = self
            .transport()
            .subscribe(deliver.clone(), queue.map(str::to_string))
            .await
            .map_err(ClientError::from)?;

        let binding = if should_create {
            config.ack_policy = options.ack_policy.unwrap_or(AckPolicy::Explicit);
            // With acks on and no explicit cap, bound in-flight messages
            // by the local pending limit.
            if config.max_ack_pending.is_none() && config.ack_policy != AckPolicy::None {
                config.max_ack_pending = Some(DEFAULT_PENDING_MSGS_LIMIT);
            }

            match self.add_consumer(&stream, &config).await {
                Ok(info) => {
                    debug!(
                        stream = %info.stream,
                        consumer = %info.name,
                        pull = is_pull,
                        "created consumer"
                    );
                    ConsumerBinding::new(
                        info.stream,
                        info.name,
                        info.config.deliver_subject.filter(|d| !d.is_empty()),
                        pull_batch,
                        deliver.clone(),
                    )
                }
                Err(error) => {
                    if let Err(unsub_error) = mailbox.unsubscribe().await {
                        debug!(error = %unsub_error, "unwind unsubscribe failed");
                    }
                    return Err(error);
                }
            }
        } else {
            let bound_deliver = if self.is_direct() {
                options.deliver_subject.clone()
            } else {
                attached_config
                    .and_then(|c| c.deliver_subject)
                    .filter(|d| !d.is_empty())
            };
            debug!(
                stream = options.bind_stream.as_deref().unwrap_or_default(),
                consumer = options.bind_consumer.as_deref().unwrap_or_default(),
                direct = self.is_direct(),
                "attached to consumer"
            );
            ConsumerBinding::new(
                options.bind_stream.clone().unwrap_or_default(),
                options.bind_consumer.clone().unwrap_or_default(),
                bound_deliver,
                pull_batch,
                deliver.clone(),
            )
        };

        let binding = Arc::new(Mutex::new(binding));
        let subscription = match handler {
            Some(handler) => Subscription::with_handler(
                self.clone(),
                deliver,
                binding,
                mailbox,
                handler,
                !options.manual_ack,
            ),
            None => Subscription::with_mailbox(self.clone(), deliver, binding, mailbox),
        };

        // Prime pull consumers so the subscription starts populated.
        if is_pull {
            subscription.poll().await?;
        }

        Ok(subscription)
    }
}

enum Driver {
    /// Messages are read by the caller through `next`.
    Stream(Box<dyn Mailbox>),
    /// Messages are dispatched to a handler by a background task.
    Handler {
        stop: Option<oneshot::Sender<()>>,
        task: JoinHandle<()>,
    },
}

/// A local subscription bound to a remote stream and consumer.
pub struct Subscription {
    context: JetStreamContext,
    subject: String,
    binding: Arc<Mutex<ConsumerBinding>>,
    driver: Driver,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    fn with_mailbox(
        context: JetStreamContext,
        subject: String,
        binding: Arc<Mutex<ConsumerBinding>>,
        mailbox: Box<dyn Mailbox>,
    ) -> Self {
        Self {
            context,
            subject,
            binding,
            driver: Driver::Stream(mailbox),
        }
    }

    fn with_handler(
        context: JetStreamContext,
        subject: String,
        binding: Arc<Mutex<ConsumerBinding>>,
        mut mailbox: Box<dyn Mailbox>,
        handler: MessageHandler,
        auto_ack: bool,
    ) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task_context = context.clone();
        let task_binding = Arc::clone(&binding);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stopped => {
                        if let Err(error) = mailbox.unsubscribe().await {
                            debug!(%error, "unsubscribe on shutdown failed");
                        }
                        break;
                    }
                    delivered = mailbox.recv() => {
                        let Some(delivery) = delivered else { break };
                        let message = JsMessage::new(
                            task_context.clone(),
                            Arc::clone(&task_binding),
                            delivery,
                        );
                        // Auto-ack runs in the same execution context as
                        // the handler, so ordering relative to the next
                        // delivery is preserved.
                        let to_ack = message.clone();
                        handler(message);
                        if auto_ack {
                            if let Err(error) = to_ack.ack().await {
                                warn!(%error, "auto-acknowledgment failed");
                            }
                        }
                    }
                }
            }
        });

        Self {
            context,
            subject,
            binding,
            driver: Driver::Handler {
                stop: Some(stop),
                task,
            },
        }
    }

    /// Subject of the local delivery subscription.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Snapshot of the binding state.
    pub async fn binding(&self) -> ConsumerBinding {
        self.binding.lock().await.clone()
    }

    /// Next delivered message, or `None` once the subscription closes.
    /// Only valid on subscriptions without a handler.
    pub async fn next(&mut self) -> Result<Option<JsMessage>, ClientError> {
        match &mut self.driver {
            Driver::Stream(mailbox) => Ok(mailbox.recv().await.map(|delivery| {
                JsMessage::new(self.context.clone(), Arc::clone(&self.binding), delivery)
            })),
            Driver::Handler { .. } => Err(ClientError::InvalidSubscriptionType),
        }
    }

    /// Request the next batch for a pull consumer.
    ///
    /// Fire-and-forget: deliveries arrive asynchronously through the
    /// local subscription, whose subject serves as the return address.
    pub async fn poll(&self) -> Result<(), ClientError> {
        let (stream, consumer, batch, reply) = {
            let binding = self.binding.lock().await;
            if !binding.is_pull() {
                return Err(ClientError::InvalidSubscriptionType);
            }
            (
                binding.stream().to_string(),
                binding.consumer().to_string(),
                binding.pull_batch(),
                binding.local_subject().to_string(),
            )
        };

        let body = serde_json::to_vec(&NextRequest { batch })?;
        let subject = self.context.subjects().next_request(&stream, &consumer);
        debug!(%subject, batch, "requesting next pull batch");
        self.context
            .transport()
            .publish_with_reply(subject, reply, body.into())
            .await
            .map_err(ClientError::from)
    }

    /// Fetch the bound consumer's snapshot on demand.
    pub async fn consumer_info(&self) -> Result<ConsumerInfo, ClientError> {
        let (stream, consumer) = {
            let binding = self.binding.lock().await;
            if binding.consumer().is_empty() {
                return Err(ClientError::InvalidSubscriptionType);
            }
            (binding.stream().to_string(), binding.consumer().to_string())
        };
        self.context.consumer_info(&stream, &consumer).await
    }

    /// Tear down the local subscription. Handler subscriptions stop their
    /// dispatch task before unsubscribing.
    pub async fn unsubscribe(&mut self) -> Result<(), ClientError> {
        match &mut self.driver {
            Driver::Stream(mailbox) => mailbox.unsubscribe().await.map_err(ClientError::from),
            Driver::Handler { stop, task } => {
                if let Some(stop) = stop.take() {
                    let _ = stop.send(());
                    let _ = (&mut *task).await;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
