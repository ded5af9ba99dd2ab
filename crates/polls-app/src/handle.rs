//! PollsHandle - send user actions to a running engine
//!
//! [`PollsEngine::run`](crate::PollsEngine::run) takes the engine for the
//! lifetime of its loop. UI code keeps a handle instead: actions travel
//! through the same message channel as channel changes, and reads go
//! straight to the published snapshots and view state.

use tokio::sync::{mpsc, watch};

use polls_core::prelude::*;
use polls_core::{OptionId, Poll};

use crate::engine::validate_poll;
use crate::lifecycle::LifecycleSignal;
use crate::message::Message;
use crate::reconciler::PollSnapshot;
use crate::view_state::{ViewState, ViewStateMachine};

/// Cloneable sender of user actions plus read access to engine state
#[derive(Debug, Clone)]
pub struct PollsHandle {
    msg_tx: mpsc::Sender<Message>,
    view: ViewStateMachine,
    polls: watch::Receiver<PollSnapshot>,
}

impl PollsHandle {
    pub(crate) fn new(
        msg_tx: mpsc::Sender<Message>,
        view: ViewStateMachine,
        polls: watch::Receiver<PollSnapshot>,
    ) -> Self {
        Self { msg_tx, view, polls }
    }

    /// Queue a poll insert. Unbound options are rejected here, before
    /// anything is queued.
    pub async fn create_poll(&self, poll: Poll) -> Result<()> {
        validate_poll(&poll)?;
        self.send(Message::CreatePoll(poll)).await
    }

    pub async fn increment_option(&self, option_id: OptionId) -> Result<()> {
        self.send(Message::IncrementOption(option_id)).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(Message::Refresh).await
    }

    pub async fn signal(&self, signal: LifecycleSignal) -> Result<()> {
        self.send(Message::Signal(signal)).await
    }

    /// Current canonical polls
    pub fn polls(&self) -> PollSnapshot {
        self.polls.borrow().clone()
    }

    pub fn subscribe_polls(&self) -> watch::Receiver<PollSnapshot> {
        self.polls.clone()
    }

    pub fn view_state(&self) -> ViewState {
        self.view.state()
    }

    /// Take the pending store failure, if any (one-shot)
    pub fn take_failure(&self) -> Option<String> {
        self.view.take_failure()
    }

    pub fn subscribe_failures(&self) -> watch::Receiver<Option<String>> {
        self.view.subscribe_failures()
    }

    async fn send(&self, msg: Message) -> Result<()> {
        trace!("Queueing {}", msg.label());
        self.msg_tx
            .send(msg)
            .await
            .map_err(|_| Error::EngineShutdown)
    }
}
