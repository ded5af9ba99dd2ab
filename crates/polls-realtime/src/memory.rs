//! In-process backend implementing both the remote store and the channel
//! transport.
//!
//! Rows live in memory and every successful write is echoed as a change
//! envelope on the matching table channel, the same way the hosted database
//! publishes row changes. Delivery is at-most-once: nothing is queued while
//! disconnected or unsubscribed, and a full subscriber buffer drops the
//! message.
//!
//! Used by the headless replay mode and as the test double for the engine.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use polls_core::prelude::*;
use polls_core::{ChangeKind, Channel, OptionId, Poll, PollOption};

use crate::channel::{ChannelMessage, ChannelSubscriber, ChannelTopic, Subscription};
use crate::protocol::encode_change;
use crate::store::{RemoteStore, StoreOp};

/// Default capacity of each subscription buffer
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

/// Transport calls in the order they were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Subscribe(String),
    Unsubscribe(String),
}

#[derive(Debug, Default)]
struct BackendState {
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    connected: bool,
    subscriptions: HashMap<ChannelTopic, mpsc::Sender<ChannelMessage>>,
    store_failures: HashMap<StoreOp, String>,
    connect_failure: Option<String>,
    transport_log: Vec<TransportCall>,
}

impl BackendState {
    fn take_failure(&mut self, op: StoreOp) -> Result<()> {
        match self.store_failures.remove(&op) {
            Some(message) => {
                debug!("Injected failure for {}: {}", op, message);
                Err(Error::store(message))
            }
            None => Ok(()),
        }
    }

    /// Deliver a payload to the topic's subscriber, if any
    fn deliver(&mut self, topic: &ChannelTopic, payload: Value) -> bool {
        if !self.connected {
            trace!("Not connected, dropping change for {}", topic);
            return false;
        }
        let Some(tx) = self.subscriptions.get(topic) else {
            trace!("No subscriber for {}, dropping change", topic);
            return false;
        };

        let message = ChannelMessage {
            topic: topic.name(),
            payload,
        };
        match tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Subscriber buffer full for {}, dropping change", topic);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Subscriber for {} went away", topic);
                self.subscriptions.remove(topic);
                false
            }
        }
    }
}

/// In-memory store and realtime transport
#[derive(Debug)]
pub struct InMemoryBackend {
    polls_topic: ChannelTopic,
    options_topic: ChannelTopic,
    subscription_buffer: usize,
    state: Mutex<BackendState>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Backend with the default `public.polls` / `public.options` tables
    pub fn new() -> Self {
        Self::with_topics(
            ChannelTopic::table("polls", "public"),
            ChannelTopic::table("options", "public"),
        )
    }

    pub fn with_topics(polls_topic: ChannelTopic, options_topic: ChannelTopic) -> Self {
        Self {
            polls_topic,
            options_topic,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
            state: Mutex::new(BackendState::default()),
        }
    }

    pub fn with_subscription_buffer(mut self, capacity: usize) -> Self {
        self.subscription_buffer = capacity.max(1);
        self
    }

    pub fn topic(&self, channel: Channel) -> &ChannelTopic {
        match channel {
            Channel::Polls => &self.polls_topic,
            Channel::Options => &self.options_topic,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Seeding & Inspection
    // ─────────────────────────────────────────────────────────

    /// Add rows directly, without emitting change events
    pub async fn seed(&self, polls: Vec<Poll>, options: Vec<PollOption>) {
        let mut state = self.state.lock().await;
        for mut poll in polls {
            strip_options(&mut poll);
            state.polls.push(poll);
        }
        state.options.extend(options);
    }

    /// Make the next call of `op` fail with `message`
    pub async fn fail_next(&self, op: StoreOp, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .store_failures
            .insert(op, message.into());
    }

    /// Make the next transport connect fail with `message`
    pub async fn fail_next_connect(&self, message: impl Into<String>) {
        self.state.lock().await.connect_failure = Some(message.into());
    }

    /// Push an arbitrary payload onto a channel, as if the server sent it.
    ///
    /// Returns whether a subscriber received it.
    pub async fn publish(&self, channel: Channel, payload: Value) -> bool {
        let topic = self.topic(channel).clone();
        self.state.lock().await.deliver(&topic, payload)
    }

    /// Current rows, in insertion order
    pub async fn rows(&self) -> (Vec<Poll>, Vec<PollOption>) {
        let state = self.state.lock().await;
        (state.polls.clone(), state.options.clone())
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn is_subscribed(&self, channel: Channel) -> bool {
        let topic = self.topic(channel);
        self.state.lock().await.subscriptions.contains_key(topic)
    }

    /// Transport calls made so far
    pub async fn transport_log(&self) -> Vec<TransportCall> {
        self.state.lock().await.transport_log.clone()
    }

    fn emit<T: serde::Serialize>(
        &self,
        state: &mut BackendState,
        channel: Channel,
        kind: ChangeKind,
        record: &T,
    ) -> Result<()> {
        let topic = self.topic(channel).clone();
        let payload = encode_change(kind, &topic, record)?;
        state.deliver(&topic, payload);
        Ok(())
    }
}

fn strip_options(poll: &mut Poll) {
    poll.options.clear();
}

// ─────────────────────────────────────────────────────────
// Remote Store
// ─────────────────────────────────────────────────────────

impl RemoteStore for InMemoryBackend {
    async fn fetch_polls(&self) -> Result<Vec<Poll>> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::FetchPolls)?;
        Ok(state.polls.clone())
    }

    async fn fetch_options(&self) -> Result<Vec<PollOption>> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::FetchOptions)?;
        Ok(state.options.clone())
    }

    async fn insert_poll(&self, poll: &Poll) -> Result<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::InsertPoll)?;

        if state.polls.iter().any(|p| p.id == poll.id) {
            return Err(Error::duplicate(Channel::Polls.entity(), poll.id));
        }

        let mut row = poll.clone();
        strip_options(&mut row);
        state.polls.push(row.clone());
        debug!("Inserted poll {} ({})", row.id, row.name);

        self.emit(&mut state, Channel::Polls, ChangeKind::Insert, &row)
    }

    async fn insert_options(&self, options: &[PollOption]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::InsertOptions)?;

        // All-or-nothing, like a single multi-row INSERT
        for option in options {
            if state.options.iter().any(|o| o.id == option.id) {
                return Err(Error::duplicate(Channel::Options.entity(), option.id));
            }
            if !state.polls.iter().any(|p| p.id == option.poll_id) {
                return Err(Error::store(format!(
                    "option {} references unknown poll {}",
                    option.id, option.poll_id
                )));
            }
        }

        for option in options {
            state.options.push(option.clone());
            self.emit(&mut state, Channel::Options, ChangeKind::Insert, option)?;
        }
        debug!("Inserted {} options", options.len());
        Ok(())
    }

    async fn increment_option_count(&self, id: OptionId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.take_failure(StoreOp::IncrementOptionCount)?;

        let option = {
            let option = state
                .options
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| Error::not_found(Channel::Options.entity(), id))?;
            option.count += 1;
            option.clone()
        };
        self.emit(&mut state, Channel::Options, ChangeKind::Update, &option)?;

        // The server-side function also stamps the parent poll
        let poll = state.polls.iter_mut().find(|p| p.id == option.poll_id).map(|poll| {
            poll.last_updated_option_id = Some(option.id);
            poll.updated_at = Utc::now();
            poll.clone()
        });
        if let Some(poll) = poll {
            self.emit(&mut state, Channel::Polls, ChangeKind::Update, &poll)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Channel Transport
// ─────────────────────────────────────────────────────────

impl ChannelSubscriber for InMemoryBackend {
    async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.transport_log.push(TransportCall::Connect);
        if let Some(message) = state.connect_failure.take() {
            return Err(Error::transport(message));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.transport_log.push(TransportCall::Disconnect);
        state.connected = false;
        state.subscriptions.clear();
        Ok(())
    }

    async fn subscribe(&self, topic: &ChannelTopic) -> Result<Subscription> {
        let mut state = self.state.lock().await;
        state.transport_log.push(TransportCall::Subscribe(topic.name()));
        if !state.connected {
            return Err(Error::subscribe(topic.name(), "transport is not connected"));
        }

        let (tx, rx) = mpsc::channel(self.subscription_buffer);
        if state.subscriptions.insert(topic.clone(), tx).is_some() {
            debug!("Replaced existing subscription for {}", topic);
        }
        Ok(Subscription {
            topic: topic.clone(),
            receiver: rx,
        })
    }

    async fn unsubscribe(&self, topic: &ChannelTopic) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .transport_log
            .push(TransportCall::Unsubscribe(topic.name()));
        state.subscriptions.remove(topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_option_change, decode_poll_change};
    use tokio_test::{assert_err, assert_ok};

    async fn connected_backend() -> (InMemoryBackend, Subscription, Subscription) {
        let backend = InMemoryBackend::new();
        backend.connect().await.unwrap();
        let polls = backend
            .subscribe(&ChannelTopic::table("polls", "public"))
            .await
            .unwrap();
        let options = backend
            .subscribe(&ChannelTopic::table("options", "public"))
            .await
            .unwrap();
        (backend, polls, options)
    }

    #[tokio::test]
    async fn test_insert_poll_echoes_insert_event() {
        let (backend, mut polls, _options) = connected_backend().await;
        let poll = Poll::with_options("Console", ["PS5"]);

        backend.insert_poll(&poll).await.unwrap();

        let message = polls.receiver.try_recv().unwrap();
        assert_eq!(message.topic, "realtime:public:polls");
        let change = decode_poll_change(&message.payload).unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.record.id, poll.id);
        assert!(change.record.options.is_empty());
    }

    #[tokio::test]
    async fn test_full_subscription_buffer_drops_changes() {
        let backend = InMemoryBackend::new().with_subscription_buffer(1);
        backend.connect().await.unwrap();
        let mut polls = backend
            .subscribe(&ChannelTopic::table("polls", "public"))
            .await
            .unwrap();

        backend.insert_poll(&Poll::new("First")).await.unwrap();
        backend.insert_poll(&Poll::new("Second")).await.unwrap();

        let first = decode_poll_change(&polls.receiver.try_recv().unwrap().payload).unwrap();
        assert_eq!(first.record.name, "First");
        assert!(polls.receiver.try_recv().is_err());
        // The write itself still landed
        assert_eq!(backend.rows().await.0.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_duplicate_poll_fails() {
        let backend = InMemoryBackend::new();
        let poll = Poll::new("Console");

        backend.insert_poll(&poll).await.unwrap();
        let err = backend.insert_poll(&poll).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate { entity: "poll", .. }));
    }

    #[tokio::test]
    async fn test_insert_options_requires_parent_poll() {
        let backend = InMemoryBackend::new();
        let orphan = PollOption::new("PS5", polls_core::PollId::new());

        assert_err!(backend.insert_options(&[orphan]).await);
        assert!(backend.rows().await.1.is_empty());
    }

    #[tokio::test]
    async fn test_increment_updates_option_and_poll() {
        let (backend, mut polls, mut options) = connected_backend().await;
        let poll = Poll::with_options("Console", ["PS5", "Switch"]);
        backend.seed(vec![poll.clone()], poll.options.clone()).await;
        let target = poll.options[1].id;

        backend.increment_option_count(target).await.unwrap();

        let option = decode_option_change(&options.receiver.try_recv().unwrap().payload).unwrap();
        assert_eq!(option.kind, ChangeKind::Update);
        assert_eq!(option.record.id, target);
        assert_eq!(option.record.count, 1);

        let updated = decode_poll_change(&polls.receiver.try_recv().unwrap().payload).unwrap();
        assert_eq!(updated.kind, ChangeKind::Update);
        assert_eq!(updated.record.last_updated_option_id, Some(target));
    }

    #[tokio::test]
    async fn test_increment_unknown_option_fails() {
        let backend = InMemoryBackend::new();
        let err = backend
            .increment_option_count(OptionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_writes_while_disconnected_are_not_delivered() {
        let (backend, mut polls, _options) = connected_backend().await;
        backend.disconnect().await.unwrap();

        backend.insert_poll(&Poll::new("Missed")).await.unwrap();

        // Disconnect drops the channel, so the receiver is closed and empty
        assert!(polls.receiver.recv().await.is_none());
        assert_eq!(backend.rows().await.0.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let backend = InMemoryBackend::new();
        backend.fail_next(StoreOp::FetchPolls, "network down").await;

        let err = assert_err!(backend.fetch_polls().await);
        assert_eq!(err.to_string(), "Remote store error: network down");
        assert_ok!(backend.fetch_polls().await);
    }

    #[tokio::test]
    async fn test_subscribe_requires_connection() {
        let backend = InMemoryBackend::new();
        let result = backend
            .subscribe(&ChannelTopic::table("polls", "public"))
            .await;
        assert!(matches!(result, Err(Error::Subscribe { .. })));
    }

    #[tokio::test]
    async fn test_transport_log_records_order() {
        let (backend, _polls, _options) = connected_backend().await;
        backend
            .unsubscribe(&ChannelTopic::table("polls", "public"))
            .await
            .unwrap();
        backend.disconnect().await.unwrap();

        assert_eq!(
            backend.transport_log().await,
            vec![
                TransportCall::Connect,
                TransportCall::Subscribe("realtime:public:polls".into()),
                TransportCall::Subscribe("realtime:public:options".into()),
                TransportCall::Unsubscribe("realtime:public:polls".into()),
                TransportCall::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_raw_payload() {
        let (backend, _polls, mut options) = connected_backend().await;

        let delivered = backend
            .publish(Channel::Options, serde_json::json!({"type": "INSERT"}))
            .await;

        assert!(delivered);
        assert!(options.receiver.try_recv().is_ok());
    }
}
