//! Configuration types for LivePolls
//!
//! Defines:
//! - `Settings` - Global engine settings (.livepolls/config.toml)
//! - Related sub-sections

use serde::{Deserialize, Serialize};

use polls_core::Channel;
use polls_realtime::ChannelTopic;

/// Application settings (.livepolls/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub behavior: BehaviorSettings,
}

/// Which tables the engine reads and subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RealtimeSettings {
    /// Database schema of both tables
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_polls_table")]
    pub polls_table: String,

    #[serde(default = "default_options_table")]
    pub options_table: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            polls_table: default_polls_table(),
            options_table: default_options_table(),
        }
    }
}

impl RealtimeSettings {
    /// Channel topic for one of the two entity channels
    pub fn topic(&self, channel: Channel) -> ChannelTopic {
        match channel {
            Channel::Polls => ChannelTopic::table(&self.polls_table, &self.schema),
            Channel::Options => ChannelTopic::table(&self.options_table, &self.schema),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_polls_table() -> String {
    "polls".to_string()
}

fn default_options_table() -> String {
    "options".to_string()
}

/// Buffer sizes for the engine's internal channels
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Capacity of the message channel feeding the reconciler
    #[serde(default = "default_message_buffer")]
    pub message_buffer: usize,

    /// Capacity of the engine event broadcast
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            message_buffer: default_message_buffer(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_message_buffer() -> usize {
    256
}

fn default_event_buffer() -> usize {
    256
}

/// Behavior settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BehaviorSettings {
    /// Run a bulk refresh after every reconnect (not the first connect).
    /// Events published while disconnected are otherwise lost.
    #[serde(default)]
    pub refresh_on_reconnect: bool,

    /// Log transport open/close at info level instead of debug
    #[serde(default)]
    pub transport_logging: bool,
}
