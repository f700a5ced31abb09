//! Recording mock transport for driving the engine in tests.
//!
//! Canned responses are queued per request subject; every request,
//! publish, subscribe, and unsubscribe is recorded so tests can assert on
//! the exact wire traffic. A request subject with no queued response
//! answers with no-responders, which is also the right default for
//! asserting that an operation issued zero remote calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::transport::{Delivery, Mailbox, Transport, TransportError};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub subject: String,
    pub payload: Bytes,
    pub headers: Option<HeaderMap>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedPublish {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedSubscribe {
    pub subject: String,
    pub queue: Option<String>,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, VecDeque<Bytes>>,
    requests: Vec<RecordedRequest>,
    publishes: Vec<RecordedPublish>,
    subscribes: Vec<RecordedSubscribe>,
    unsubscribes: Vec<String>,
    senders: HashMap<String, mpsc::UnboundedSender<Delivery>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Queue a JSON reply for the next request on `subject`.
    pub fn reply_with(&self, subject: &str, body: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry(subject.to_string())
            .or_default()
            .push_back(Bytes::copy_from_slice(body.as_bytes()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn publishes(&self) -> Vec<RecordedPublish> {
        self.state.lock().unwrap().publishes.clone()
    }

    pub fn subscribes(&self) -> Vec<RecordedSubscribe> {
        self.state.lock().unwrap().subscribes.clone()
    }

    pub fn unsubscribes(&self) -> Vec<String> {
        self.state.lock().unwrap().unsubscribes.clone()
    }

    /// Inject a delivery into the mailbox subscribed on `subject`.
    pub fn deliver(&self, subject: &str, delivery: Delivery) {
        let state = self.state.lock().unwrap();
        let sender = state
            .senders
            .get(subject)
            .unwrap_or_else(|| panic!("no subscription on {subject}"));
        sender.send(delivery).expect("mailbox closed");
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        subject: String,
        headers: Option<HeaderMap>,
        payload: Bytes,
        _timeout: Duration,
    ) -> Result<Delivery, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            subject: subject.clone(),
            payload,
            headers,
        });
        match state.responses.get_mut(&subject).and_then(VecDeque::pop_front) {
            Some(body) => Ok(Delivery {
                subject,
                reply: None,
                payload: body,
                headers: None,
            }),
            None => Err(TransportError::NoResponders),
        }
    }

    async fn publish(&self, subject: String, payload: Bytes) -> Result<(), TransportError> {
        self.state.lock().unwrap().publishes.push(RecordedPublish {
            subject,
            reply: None,
            payload,
        });
        Ok(())
    }

    async fn publish_with_reply(
        &self,
        subject: String,
        reply: String,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        self.state.lock().unwrap().publishes.push(RecordedPublish {
            subject,
            reply: Some(reply),
            payload,
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: String,
        queue: Option<String>,
    ) -> Result<Box<dyn Mailbox>, TransportError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.subscribes.push(RecordedSubscribe {
            subject: subject.clone(),
            queue,
        });
        state.senders.insert(subject.clone(), sender);
        Ok(Box::new(MockMailbox {
            subject,
            receiver,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockMailbox {
    subject: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Mailbox for MockMailbox {
    async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.unsubscribes.push(self.subject.clone());
        state.senders.remove(&self.subject);
        self.receiver.close();
        Ok(())
    }
}
