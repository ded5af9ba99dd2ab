//! Channel forwarders: decode raw channel messages into engine messages
//!
//! One forwarder runs per active subscription. Decoding happens here, at the
//! channel boundary, so a malformed payload costs exactly one dropped event
//! and never stalls the channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use polls_core::prelude::*;
use polls_core::Channel;
use polls_realtime::{decode_option_change, decode_poll_change, ChannelMessage, Subscription};

use crate::message::Message;

/// Spawn a task forwarding `subscription` into `sink` until either side closes
pub(crate) fn spawn_forwarder(
    channel: Channel,
    subscription: Subscription,
    sink: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(forward(channel, subscription, sink))
}

async fn forward(channel: Channel, mut subscription: Subscription, sink: mpsc::Sender<Message>) {
    debug!("Forwarding {} from {}", channel, subscription.topic);

    while let Some(raw) = subscription.receiver.recv().await {
        let msg = decode_message(channel, &raw);
        if sink.send(msg).await.is_err() {
            debug!("Engine gone, stopping {} forwarder", channel);
            return;
        }
    }

    debug!("Subscription {} closed", subscription.topic);
}

/// Decode a raw message from `channel`. Failures become
/// [`Message::DecodeFailed`] after being logged.
pub fn decode_message(channel: Channel, raw: &ChannelMessage) -> Message {
    let decoded = match channel {
        Channel::Polls => decode_poll_change(&raw.payload).map(Message::PollChange),
        Channel::Options => decode_option_change(&raw.payload).map(Message::OptionChange),
    };

    match decoded {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Dropping undecodable payload on {}: {}", raw.topic, e);
            Message::DecodeFailed {
                channel,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polls_core::ChangeKind;
    use polls_realtime::test_utils::{option_envelope, poll_envelope, test_option, test_poll};
    use polls_realtime::ChannelTopic;
    use serde_json::json;

    fn raw(topic: &ChannelTopic, payload: serde_json::Value) -> ChannelMessage {
        ChannelMessage {
            topic: topic.name(),
            payload,
        }
    }

    #[test]
    fn test_decode_message_routes_by_channel() {
        let topic = ChannelTopic::table("polls", "public");
        let poll = test_poll("Console");

        let msg = decode_message(
            Channel::Polls,
            &raw(&topic, poll_envelope(ChangeKind::Insert, &poll)),
        );
        assert!(matches!(msg, Message::PollChange(ref c) if c.record.id == poll.id));

        // A poll record is not an option record
        let msg = decode_message(
            Channel::Options,
            &raw(&topic, poll_envelope(ChangeKind::Insert, &poll)),
        );
        assert!(matches!(
            msg,
            Message::DecodeFailed {
                channel: Channel::Options,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_stop_forwarding() {
        let topic = ChannelTopic::table("options", "public");
        let (raw_tx, raw_rx) = mpsc::channel(8);
        let (sink, mut rx) = mpsc::channel(8);
        let handle = spawn_forwarder(
            Channel::Options,
            Subscription {
                topic: topic.clone(),
                receiver: raw_rx,
            },
            sink,
        );

        let option = test_option(test_poll("Console").id, "PS5", 1);
        raw_tx
            .send(raw(&topic, json!({"type": "UPDATE", "record": {"id": 7}})))
            .await
            .unwrap();
        raw_tx
            .send(raw(&topic, option_envelope(ChangeKind::Update, &option)))
            .await
            .unwrap();
        drop(raw_tx);

        assert!(matches!(rx.recv().await, Some(Message::DecodeFailed { .. })));
        match rx.recv().await {
            Some(Message::OptionChange(change)) => assert_eq!(change.record, option),
            other => panic!("expected option change, got {:?}", other),
        }

        // Subscription closed, forwarder exits
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_forwarder_stops_when_sink_closes() {
        let topic = ChannelTopic::table("polls", "public");
        let (raw_tx, raw_rx) = mpsc::channel(8);
        let (sink, rx) = mpsc::channel(8);
        drop(rx);

        let handle = spawn_forwarder(
            Channel::Polls,
            Subscription {
                topic: topic.clone(),
                receiver: raw_rx,
            },
            sink,
        );

        let poll = test_poll("Console");
        raw_tx
            .send(raw(&topic, poll_envelope(ChangeKind::Insert, &poll)))
            .await
            .unwrap();

        handle.await.unwrap();
    }
}
