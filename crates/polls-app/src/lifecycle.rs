//! Connection lifecycle: connect/subscribe on foreground, unsubscribe/disconnect
//! on background

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use polls_core::prelude::*;
use polls_core::Channel;
use polls_realtime::{ChannelSubscriber, ChannelTopic};

use crate::config::RealtimeSettings;
use crate::ingest::spawn_forwarder;
use crate::message::Message;

/// Transport connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// App phase signals delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// App came to the foreground
    Active,
    /// App is visible but not interactive
    Inactive,
    /// App moved to the background
    Background,
}

impl LifecycleSignal {
    /// Whether this signal asks for a live connection
    pub fn is_foreground(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// What a call to [`ConnectionLifecycleController::connect`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Already connecting or connected; nothing happened
    AlreadyConnected,
    /// First successful connection
    Connected,
    /// Connection re-established after an earlier disconnect
    Reconnected,
}

/// Drives a [`ChannelSubscriber`] through connect, subscribe, unsubscribe and
/// disconnect, keeping exactly one forwarder per subscribed channel.
pub struct ConnectionLifecycleController<C> {
    subscriber: Arc<C>,
    topics: HashMap<Channel, ChannelTopic>,
    state: ConnectionState,
    forwarders: HashMap<Channel, JoinHandle<()>>,
    connections: u64,
    transport_logging: bool,
}

impl<C> ConnectionLifecycleController<C>
where
    C: ChannelSubscriber + Sync + 'static,
{
    pub fn new(subscriber: Arc<C>, realtime: &RealtimeSettings, transport_logging: bool) -> Self {
        let topics = Channel::ALL
            .into_iter()
            .map(|channel| (channel, realtime.topic(channel)))
            .collect();

        Self {
            subscriber,
            topics,
            state: ConnectionState::Disconnected,
            forwarders: HashMap::new(),
            connections: 0,
            transport_logging,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Channels with a live forwarder
    pub fn subscribed(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.forwarders.contains_key(c))
            .collect()
    }

    /// Number of successful connections so far
    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Connect the transport and subscribe both channels, forwarding decoded
    /// changes into `sink`.
    ///
    /// Only acts from `Disconnected`. On failure every partially created
    /// subscription is torn down and the state returns to `Disconnected`.
    pub async fn connect(&mut self, sink: &mpsc::Sender<Message>) -> Result<ConnectOutcome> {
        if self.state != ConnectionState::Disconnected {
            debug!("Connect ignored, already {:?}", self.state);
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        self.state = ConnectionState::Connecting;
        self.log_transport("Opening realtime connection");

        if let Err(e) = self.open(sink).await {
            warn!("Realtime connection failed: {}", e);
            if let Err(teardown) = self.teardown().await {
                debug!("Teardown after failed connect: {}", teardown);
            }
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Connected;
        self.connections += 1;
        self.log_transport("Realtime connection established");

        Ok(if self.connections > 1 {
            ConnectOutcome::Reconnected
        } else {
            ConnectOutcome::Connected
        })
    }

    /// Unsubscribe both channels, then disconnect the transport.
    ///
    /// Returns `false` if already disconnected. Teardown always completes;
    /// the first transport error is returned afterwards.
    pub async fn disconnect(&mut self) -> Result<bool> {
        if self.state == ConnectionState::Disconnected {
            debug!("Disconnect ignored, not connected");
            return Ok(false);
        }

        self.log_transport("Closing realtime connection");
        let result = self.teardown().await;
        self.state = ConnectionState::Disconnected;
        result.map(|()| true)
    }

    async fn open(&mut self, sink: &mpsc::Sender<Message>) -> Result<()> {
        self.subscriber.connect().await?;

        for channel in Channel::ALL {
            let topic = self.topic(channel)?;
            let subscription = self.subscriber.subscribe(&topic).await?;

            let handle = spawn_forwarder(channel, subscription, sink.clone());
            if let Some(previous) = self.forwarders.insert(channel, handle) {
                previous.abort();
            }
            debug!("Subscribed to {}", topic);
        }

        Ok(())
    }

    /// Unsubscribe every subscribed channel, then disconnect
    async fn teardown(&mut self) -> Result<()> {
        let mut first_error = None;

        for channel in Channel::ALL {
            let Some(handle) = self.forwarders.remove(&channel) else {
                continue;
            };
            handle.abort();

            let topic = self.topic(channel)?;
            if let Err(e) = self.subscriber.unsubscribe(&topic).await {
                warn!("Failed to unsubscribe {}: {}", topic, e);
                first_error.get_or_insert(e);
            } else {
                debug!("Unsubscribed from {}", topic);
            }
        }

        if let Err(e) = self.subscriber.disconnect().await {
            warn!("Failed to disconnect transport: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn topic(&self, channel: Channel) -> Result<ChannelTopic> {
        self.topics
            .get(&channel)
            .cloned()
            .ok_or_else(|| Error::subscribe(channel.to_string(), "no topic configured"))
    }

    fn log_transport(&self, message: &str) {
        if self.transport_logging {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

impl<C> Drop for ConnectionLifecycleController<C> {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}
