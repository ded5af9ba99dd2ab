//! Canonical poll state and the merge rules for bulk installs and streamed changes
//!
//! [`StateReconciler`] is the only writer of canonical state. Every mutation
//! replaces the affected poll copy-on-write and publishes a complete snapshot
//! through a `watch` channel, so readers never observe a half-applied change.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use polls_core::prelude::*;
use polls_core::{ChangeKind, OptionChange, OptionId, Poll, PollChange, PollId, PollOption};

/// Immutable view of the poll list, in insertion order
pub type PollSnapshot = Arc<Vec<Arc<Poll>>>;

/// Result of merging a single change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new poll or option was appended
    Inserted,
    /// An existing poll or option was updated in place
    Updated,
    /// The inserted id is already present; state unchanged
    Duplicate,
    /// No poll matches the change; state unchanged
    MissingPoll,
    /// The parent poll exists but holds no such option; state unchanged
    MissingOption,
}

impl ApplyOutcome {
    /// Whether canonical state was modified
    pub fn changed(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Duplicate => "duplicate",
            Self::MissingPoll => "missing_poll",
            Self::MissingOption => "missing_option",
        }
    }
}

/// Counts reported by a bulk install
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Polls in the installed state
    pub polls: usize,
    /// Options attached to a poll
    pub options: usize,
    /// Orphaned or repeated rows that were discarded
    pub dropped: usize,
}

/// Single owner of the canonical poll collection
#[derive(Debug)]
pub struct StateReconciler {
    polls: PollSnapshot,
    snapshot_tx: watch::Sender<PollSnapshot>,
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl StateReconciler {
    pub fn new() -> Self {
        let polls: PollSnapshot = Arc::new(Vec::new());
        let (snapshot_tx, _) = watch::channel(polls.clone());
        Self { polls, snapshot_tx }
    }

    /// Current snapshot of all polls
    pub fn snapshot(&self) -> PollSnapshot {
        self.polls.clone()
    }

    /// Receive a new snapshot every time canonical state changes
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn poll(&self, id: PollId) -> Option<Arc<Poll>> {
        self.polls.iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    // ─────────────────────────────────────────────────────────
    // Bulk install
    // ─────────────────────────────────────────────────────────

    /// Replace all state with a fresh fetch result.
    ///
    /// Options attach to the poll matching their `poll_id` in the order given.
    /// Options with no matching poll, and repeated poll or option ids, are
    /// dropped. Nothing from the previous state survives.
    pub fn install(&mut self, polls: Vec<Poll>, options: Vec<PollOption>) -> InstallSummary {
        let mut summary = InstallSummary::default();
        let mut installed: Vec<Poll> = Vec::with_capacity(polls.len());
        let mut index: HashMap<PollId, usize> = HashMap::with_capacity(polls.len());

        for mut poll in polls {
            if index.contains_key(&poll.id) {
                debug!("Install: repeated poll {} dropped", poll.id);
                summary.dropped += 1;
                continue;
            }
            poll.options.clear();
            index.insert(poll.id, installed.len());
            installed.push(poll);
        }

        for option in options {
            let Some(&slot) = index.get(&option.poll_id) else {
                debug!(
                    "Install: option {} references unknown poll {}",
                    option.id, option.poll_id
                );
                summary.dropped += 1;
                continue;
            };

            let parent = &mut installed[slot];
            if parent.has_option(option.id) {
                debug!("Install: repeated option {} dropped", option.id);
                summary.dropped += 1;
                continue;
            }
            parent.options.push(option);
            summary.options += 1;
        }

        summary.polls = installed.len();
        self.polls = Arc::new(installed.into_iter().map(Arc::new).collect());
        self.publish();
        summary
    }

    // ─────────────────────────────────────────────────────────
    // Streamed changes
    // ─────────────────────────────────────────────────────────

    pub fn apply_poll_change(&mut self, change: PollChange) -> ApplyOutcome {
        match change.kind {
            ChangeKind::Insert => self.apply_poll_insert(change.record),
            ChangeKind::Update => self.apply_poll_update(change.record),
        }
    }

    pub fn apply_option_change(&mut self, change: OptionChange) -> ApplyOutcome {
        match change.kind {
            ChangeKind::Insert => self.apply_option_insert(change.record),
            ChangeKind::Update => self.apply_option_update(change.record),
        }
    }

    /// Append a poll unless its id is already present
    pub fn apply_poll_insert(&mut self, mut poll: Poll) -> ApplyOutcome {
        if self.position(poll.id).is_some() {
            return ApplyOutcome::Duplicate;
        }

        poll.options.clear();
        Arc::make_mut(&mut self.polls).push(Arc::new(poll));
        self.publish();
        ApplyOutcome::Inserted
    }

    /// Overwrite `last_updated_option_id` and `updated_at` of a known poll.
    /// Name, creation time and options are left untouched.
    pub fn apply_poll_update(&mut self, poll: Poll) -> ApplyOutcome {
        let Some(slot) = self.position(poll.id) else {
            debug!("Poll update for unknown poll {} dropped", poll.id);
            return ApplyOutcome::MissingPoll;
        };

        let target = self.poll_mut(slot);
        target.last_updated_option_id = poll.last_updated_option_id;
        target.updated_at = poll.updated_at;
        self.publish();
        ApplyOutcome::Updated
    }

    /// Append an option to its parent poll; orphans are dropped, never buffered
    pub fn apply_option_insert(&mut self, option: PollOption) -> ApplyOutcome {
        let Some(slot) = self.position(option.poll_id) else {
            debug!(
                "Option insert {} for unknown poll {} dropped",
                option.id, option.poll_id
            );
            return ApplyOutcome::MissingPoll;
        };

        if self.polls[slot].has_option(option.id) {
            return ApplyOutcome::Duplicate;
        }

        self.poll_mut(slot).options.push(option);
        self.publish();
        ApplyOutcome::Inserted
    }

    /// Replace an existing option wholesale (last applied wins)
    pub fn apply_option_update(&mut self, option: PollOption) -> ApplyOutcome {
        let Some(slot) = self.position(option.poll_id) else {
            debug!(
                "Option update {} for unknown poll {} dropped",
                option.id, option.poll_id
            );
            return ApplyOutcome::MissingPoll;
        };

        let Some(index) = option_position(&self.polls[slot], option.id) else {
            debug!(
                "Option update {} not present in poll {}",
                option.id, option.poll_id
            );
            return ApplyOutcome::MissingOption;
        };

        self.poll_mut(slot).options[index] = option;
        self.publish();
        ApplyOutcome::Updated
    }

    fn position(&self, id: PollId) -> Option<usize> {
        self.polls.iter().position(|p| p.id == id)
    }

    /// Mutable access to one poll. Clones the list and the poll if a
    /// published snapshot still shares them.
    fn poll_mut(&mut self, slot: usize) -> &mut Poll {
        Arc::make_mut(&mut Arc::make_mut(&mut self.polls)[slot])
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.polls.clone());
    }
}

fn option_position(poll: &Poll, id: OptionId) -> Option<usize> {
    poll.options.iter().position(|o| o.id == id)
}
