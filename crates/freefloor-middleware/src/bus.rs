//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber receives
//! every message without any single subscriber blocking the others.  The
//! detection loop publishes from a plain OS thread; `broadcast::Sender::send`
//! is synchronous, so no runtime handle is needed on that side.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::FloorMask`] | Visualization image, once per completed cycle |
//! | [`Topic::PixelClicks`] | Inbound `(u, v)` selections from a viewer |
//! | [`Topic::TargetPosition`] | Ground-frame `(x, y)` answers to clicks |
//! | [`Topic::SystemAlerts`] | Lifecycle and fault notifications |

use freefloor_types::Event;
use tokio::sync::broadcast;
use tracing::trace;

/// Events buffered per topic before a slow reader starts losing the oldest.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    FloorMask,
    PixelClicks,
    TargetPosition,
    SystemAlerts,
}

/// Handle on the four topic channels; clones publish into the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    floor_mask: broadcast::Sender<Event>,
    pixel_clicks: broadcast::Sender<Event>,
    target_position: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Every topic gets its own channel of `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (floor_mask, _) = broadcast::channel(capacity);
        let (pixel_clicks, _) = broadcast::channel(capacity);
        let (target_position, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            floor_mask,
            pixel_clicks,
            target_position,
            system_alerts,
        }
    }

    /// Hand `event` to every current reader of `topic` and return how many
    /// got it.  With nobody listening the event is dropped and the count is 0.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        match self.topic_sender(topic).send(event) {
            Ok(readers) => readers,
            // The only send failure is "no receivers", however recently the
            // last one went away.
            Err(broadcast::error::SendError(_)) => {
                trace!(?topic, "no subscribers, event dropped");
                0
            }
        }
    }

    /// A reader that sees events published from now on.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::FloorMask => &self.floor_mask,
            Topic::PixelClicks => &self.pixel_clicks,
            Topic::TargetPosition => &self.target_position,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Reading end of one topic.
///
/// Created by [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event on the topic.  `Lagged(n)` means `n` events were
    /// overwritten before this reader got to them.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking poll, used by synchronous consumers.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
