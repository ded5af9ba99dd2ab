//! PollsEngine - orchestration of store, channels, reconciler and view state
//!
//! The engine owns the reconciler and the single message channel every
//! decoded change flows through, so canonical state has exactly one writer.
//! Writes go to the [`RemoteStore`] and are only reflected once their change
//! echoes back over a channel.
//!
//! Store operations can be awaited directly on the engine, or queued from a
//! [`PollsHandle`] while [`PollsEngine::run`] owns it. Queued operations run as
//! background tasks; a queued refresh reports its rows back as
//! [`Message::Fetched`] so only the engine installs them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};

use polls_core::prelude::*;
use polls_core::{Channel, OptionId, Poll, PollOption};
use polls_realtime::{ChannelSubscriber, RemoteStore};

use crate::config::Settings;
use crate::engine_event::EngineEvent;
use crate::handle::PollsHandle;
use crate::lifecycle::{
    ConnectOutcome, ConnectionLifecycleController, ConnectionState, LifecycleSignal,
};
use crate::message::Message;
use crate::reconciler::{ApplyOutcome, PollSnapshot, StateReconciler};
use crate::view_state::{ViewState, ViewStateMachine};

/// Orchestration engine for LivePolls.
///
/// Owns:
/// - The canonical state reconciler
/// - The connection lifecycle and its channel forwarders
/// - The view state machine for store operations
/// - Event broadcasting for external consumers
pub struct PollsEngine<S, C> {
    store: Arc<S>,

    reconciler: StateReconciler,

    lifecycle: ConnectionLifecycleController<C>,

    view: ViewStateMachine,

    /// Sender half of the message channel, cloned into every forwarder
    msg_tx: mpsc::Sender<Message>,

    /// Receiver half; only the engine drains it
    msg_rx: mpsc::Receiver<Message>,

    event_tx: broadcast::Sender<EngineEvent>,

    settings: Settings,

    /// Signals received through the message channel, applied by the next
    /// async processing step
    deferred_signals: Vec<LifecycleSignal>,

    /// Set by `shutdown()`; late messages are discarded afterwards
    torn_down: bool,
}

impl<S, C> PollsEngine<S, C>
where
    S: RemoteStore + Send + Sync + 'static,
    C: ChannelSubscriber + Sync + 'static,
{
    pub fn new(store: Arc<S>, subscriber: Arc<C>, settings: Settings) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(settings.engine.message_buffer.max(1));
        let (event_tx, _) = broadcast::channel(settings.engine.event_buffer.max(1));
        let lifecycle = ConnectionLifecycleController::new(
            subscriber,
            &settings.realtime,
            settings.behavior.transport_logging,
        );

        Self {
            store,
            reconciler: StateReconciler::new(),
            lifecycle,
            view: ViewStateMachine::new(),
            msg_tx,
            msg_rx,
            event_tx,
            settings,
            deferred_signals: Vec::new(),
            torn_down: false,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Read Access
    // ─────────────────────────────────────────────────────────

    /// Current canonical polls
    pub fn polls(&self) -> PollSnapshot {
        self.reconciler.snapshot()
    }

    /// Receive a fresh snapshot after every state change
    pub fn subscribe_polls(&self) -> watch::Receiver<PollSnapshot> {
        self.reconciler.subscribe()
    }

    /// Subscribe to engine events.
    ///
    /// If the subscriber falls behind, older events are dropped. Use
    /// `broadcast::error::RecvError::Lagged` to detect this.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    pub fn view_state(&self) -> ViewState {
        self.view.state()
    }

    pub fn is_in_progress(&self) -> bool {
        self.view.is_in_progress()
    }

    /// Take the pending store failure, if any (one-shot)
    pub fn take_failure(&self) -> Option<String> {
        self.view.take_failure()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_shut_down(&self) -> bool {
        self.torn_down
    }

    /// Handle for queueing user actions, usable while `run()` owns the engine
    pub fn handle(&self) -> PollsHandle {
        PollsHandle::new(
            self.msg_tx.clone(),
            self.view.clone(),
            self.reconciler.subscribe(),
        )
    }

    // ─────────────────────────────────────────────────────────
    // Store Operations
    // ─────────────────────────────────────────────────────────

    /// Initial load: bulk refresh, then connect.
    ///
    /// The connection is attempted even if the refresh fails; the refresh
    /// error is returned in that case.
    pub async fn start(&mut self) -> Result<()> {
        let refreshed = self.refresh().await;
        self.connect().await?;
        refreshed
    }

    /// Fetch all polls and options and install them as the new state.
    ///
    /// Both reads run concurrently; nothing is installed unless both succeed.
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.view.begin();

        let (polls, options) = fetch_all(self.store.as_ref(), &self.view).await?;
        self.install(polls, options);
        Ok(())
    }

    /// Insert a new poll and its options remotely.
    ///
    /// Local state is untouched until the inserts echo back.
    pub async fn create_poll(&self, poll: Poll) -> Result<()> {
        self.ensure_running()?;
        validate_poll(&poll)?;

        let _guard = self.view.begin();
        insert_poll(self.store.as_ref(), &self.view, &poll).await
    }

    /// Ask the server to add one vote to an option
    pub async fn increment_option(&self, option_id: OptionId) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.view.begin();
        increment(self.store.as_ref(), &self.view, option_id).await
    }

    // ─────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────

    /// Connect and subscribe both channels.
    ///
    /// With `refresh_on_reconnect`, a successful reconnect is followed by a
    /// bulk refresh.
    pub async fn connect(&mut self) -> Result<ConnectOutcome> {
        self.ensure_running()?;
        let before = self.lifecycle.state();
        let result = self.lifecycle.connect(&self.msg_tx).await;
        self.emit_connection_change(before);

        let outcome = result?;
        if outcome == ConnectOutcome::Reconnected && self.settings.behavior.refresh_on_reconnect {
            info!("Reconnected, refreshing to cover missed changes");
            self.refresh().await?;
        }
        Ok(outcome)
    }

    /// Unsubscribe both channels and disconnect
    pub async fn disconnect(&mut self) -> Result<()> {
        let before = self.lifecycle.state();
        let result = self.lifecycle.disconnect().await;
        self.emit_connection_change(before);
        result.map(|_| ())
    }

    /// React to an app phase change
    pub async fn handle_signal(&mut self, signal: LifecycleSignal) -> Result<()> {
        debug!("Lifecycle signal: {:?}", signal);
        if signal.is_foreground() {
            self.connect().await.map(|_| ())
        } else {
            self.disconnect().await
        }
    }

    // ─────────────────────────────────────────────────────────
    // Message Processing
    // ─────────────────────────────────────────────────────────

    /// Get a clone of the message sender for additional input sources.
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    /// Handle a single message.
    ///
    /// Channel changes and fetched rows are merged into canonical state and
    /// the matching event is emitted. Queued store actions are spawned as
    /// background tasks; signals are deferred to the next async step.
    pub fn process_message(&mut self, msg: Message) {
        if self.torn_down {
            trace!("Engine shut down, discarding {} message", msg.label());
            return;
        }

        match msg {
            Message::PollChange(change) => {
                let poll_id = change.record.id;
                let name = change.record.name.clone();
                let last_updated_option_id = change.record.last_updated_option_id;

                let event = match self.reconciler.apply_poll_change(change) {
                    ApplyOutcome::Inserted => EngineEvent::PollInserted { poll_id, name },
                    ApplyOutcome::Updated => EngineEvent::PollUpdated {
                        poll_id,
                        last_updated_option_id,
                    },
                    dropped => dropped_event(Channel::Polls, poll_id.to_string(), dropped),
                };
                self.emit(event);
            }
            Message::OptionChange(change) => {
                let poll_id = change.record.poll_id;
                let option_id = change.record.id;
                let name = change.record.name.clone();
                let count = change.record.count;

                let event = match self.reconciler.apply_option_change(change) {
                    ApplyOutcome::Inserted => EngineEvent::OptionInserted {
                        poll_id,
                        option_id,
                        name,
                    },
                    ApplyOutcome::Updated => EngineEvent::OptionUpdated {
                        poll_id,
                        option_id,
                        count,
                    },
                    dropped => dropped_event(Channel::Options, option_id.to_string(), dropped),
                };
                self.emit(event);
            }
            Message::DecodeFailed { channel, reason } => {
                self.emit(EngineEvent::ChangeDropped {
                    channel,
                    id: None,
                    reason,
                });
            }
            Message::Fetched { polls, options } => self.install(polls, options),
            Message::CreatePoll(poll) => {
                if let Err(e) = validate_poll(&poll) {
                    warn!("Rejecting queued poll {}: {}", poll.id, e);
                    self.view.fail(e.to_string());
                    return;
                }
                let store = self.store.clone();
                let view = self.view.clone();
                let guard = self.view.begin();
                tokio::spawn(async move {
                    let _guard = guard;
                    // Failures are already posted to the view state
                    let _ = insert_poll(store.as_ref(), &view, &poll).await;
                });
            }
            Message::IncrementOption(option_id) => {
                let store = self.store.clone();
                let view = self.view.clone();
                let guard = self.view.begin();
                tokio::spawn(async move {
                    let _guard = guard;
                    let _ = increment(store.as_ref(), &view, option_id).await;
                });
            }
            Message::Refresh => {
                let store = self.store.clone();
                let view = self.view.clone();
                let msg_tx = self.msg_tx.clone();
                let guard = self.view.begin();
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Ok((polls, options)) = fetch_all(store.as_ref(), &view).await {
                        if msg_tx.send(Message::Fetched { polls, options }).await.is_err() {
                            debug!("Engine gone, discarding fetched rows");
                        }
                    }
                });
            }
            Message::Signal(signal) => self.deferred_signals.push(signal),
        }
    }

    /// Drain and process all pending messages without waiting.
    ///
    /// Lifecycle signals among them wait for the next async step
    /// (`process_next`, `settle` or `run`). Returns the number of messages
    /// processed.
    pub fn drain_pending_messages(&mut self) -> usize {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg);
            count += 1;
        }
        count
    }

    /// Wait for the next message and process it.
    ///
    /// Returns `false` once the channel is closed.
    pub async fn process_next(&mut self) -> bool {
        self.apply_deferred_signals().await;
        match self.msg_rx.recv().await {
            Some(msg) => {
                self.dispatch(msg).await;
                true
            }
            None => false,
        }
    }

    /// Process messages until none arrives for `quiet`.
    ///
    /// Returns the number of messages processed.
    pub async fn settle(&mut self, quiet: Duration) -> usize {
        self.apply_deferred_signals().await;
        let mut count = 0;
        while let Ok(Some(msg)) = tokio::time::timeout(quiet, self.msg_rx.recv()).await {
            self.dispatch(msg).await;
            count += 1;
        }
        count
    }

    /// Process messages until `shutdown` turns true, then shut down.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        self.apply_deferred_signals().await;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
    }

    /// Tear the engine down: disconnect, stop forwarders and discard any
    /// message still queued or arriving later.
    pub async fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }

        if let Err(e) = self.disconnect().await {
            warn!("Error while disconnecting during shutdown: {}", e);
        }
        self.emit(EngineEvent::Shutdown);

        self.torn_down = true;
        self.deferred_signals.clear();
        self.msg_rx.close();
        let mut discarded = 0;
        while self.msg_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} pending messages on shutdown", discarded);
        }
        info!("Engine shut down");
    }

    async fn dispatch(&mut self, msg: Message) {
        self.process_message(msg);
        self.apply_deferred_signals().await;
    }

    async fn apply_deferred_signals(&mut self) {
        for signal in std::mem::take(&mut self.deferred_signals) {
            if let Err(e) = self.handle_signal(signal).await {
                warn!("Lifecycle signal {:?} failed: {}", signal, e);
            }
        }
    }

    fn install(&mut self, polls: Vec<Poll>, options: Vec<PollOption>) {
        let summary = self.reconciler.install(polls, options);
        info!(
            "Installed {} polls with {} options ({} dropped)",
            summary.polls, summary.options, summary.dropped
        );
        self.emit(EngineEvent::Installed {
            polls: summary.polls,
            options: summary.options,
            dropped: summary.dropped,
        });
    }

    fn ensure_running(&self) -> Result<()> {
        if self.torn_down {
            return Err(Error::EngineShutdown);
        }
        Ok(())
    }

    fn emit_connection_change(&self, before: ConnectionState) {
        let after = self.lifecycle.state();
        if before != after {
            self.emit(EngineEvent::ConnectionChanged {
                old: before,
                new: after,
            });
        }
    }

    fn emit(&self, event: EngineEvent) {
        trace!("Engine event: {}", event.event_type());
        let _ = self.event_tx.send(event);
    }
}

// ─────────────────────────────────────────────────────────
// Store Calls
// ─────────────────────────────────────────────────────────

/// Every option must be bound to the poll being created
pub(crate) fn validate_poll(poll: &Poll) -> Result<()> {
    match poll.options.iter().find(|o| o.poll_id != poll.id) {
        Some(option) => Err(Error::invalid_poll(format!(
            "option {} belongs to poll {}, not {}",
            option.id, option.poll_id, poll.id
        ))),
        None => Ok(()),
    }
}

/// Both reads run concurrently; nothing is returned unless both succeed
async fn fetch_all<S: RemoteStore>(
    store: &S,
    view: &ViewStateMachine,
) -> Result<(Vec<Poll>, Vec<PollOption>)> {
    let fetched = tokio::try_join!(store.fetch_polls(), store.fetch_options());
    report(view, fetched)
}

async fn insert_poll<S: RemoteStore>(store: &S, view: &ViewStateMachine, poll: &Poll) -> Result<()> {
    report(view, store.insert_poll(poll).await)?;

    if !poll.options.is_empty() {
        report(view, store.insert_options(&poll.options).await)?;
    }

    debug!(
        "Created poll {} with {} options",
        poll.id,
        poll.options.len()
    );
    Ok(())
}

async fn increment<S: RemoteStore>(
    store: &S,
    view: &ViewStateMachine,
    option_id: OptionId,
) -> Result<()> {
    report(view, store.increment_option_count(option_id).await)
}

/// Surface a store failure through the view state, then pass it on
fn report<T>(view: &ViewStateMachine, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        warn!("Remote store operation failed: {}", e);
        view.fail(e.to_string());
    }
    result
}

fn dropped_event(channel: Channel, id: String, outcome: ApplyOutcome) -> EngineEvent {
    EngineEvent::ChangeDropped {
        channel,
        id: Some(id),
        reason: outcome.as_str().to_string(),
    }
}
