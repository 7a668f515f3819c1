//! Topic-based event bus implementation.

use std::collections::HashMap;

use haunts_core::GameEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{NetEvent, TurnEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Sprites, LOS textures, waypoints, doors and viewer rebuilds
    Render,
    /// Sounds and music
    Audio,
    /// Turn state machine, committed execs and script failures
    Turn,
    /// Peer synchronisation
    Net,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone)]
pub enum Event {
    Game(GameEvent),
    Turn(TurnEvent),
    Net(NetEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Game(event) => match event {
                GameEvent::Sound { .. } | GameEvent::Music(_) => Topic::Audio,
                GameEvent::ExecCommitted(_) | GameEvent::GameEnded => Topic::Turn,
                _ => Topic::Render,
            },
            Event::Turn(_) => Topic::Turn,
            Event::Net(_) => Topic::Net,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Publishing never blocks; with no subscriber the
/// event is dropped.
#[derive(Clone)]
pub struct EventBus {
    render: broadcast::Sender<Event>,
    audio: broadcast::Sender<Event>,
    turn: broadcast::Sender<Event>,
    net: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            render: broadcast::channel(capacity).0,
            audio: broadcast::channel(capacity).0,
            turn: broadcast::channel(capacity).0,
            net: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Render => &self.render,
            Topic::Audio => &self.audio,
            Topic::Turn => &self.turn,
            Topic::Net => &self.net,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            tracing::trace!(target: "runtime::events", ?topic, "no subscribers");
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_only_their_topic() {
        let bus = EventBus::new();
        let mut audio = bus.subscribe(Topic::Audio);
        let mut render = bus.subscribe(Topic::Render);

        bus.publish(Event::Game(GameEvent::Sound {
            name: "creak".into(),
            ent: None,
        }));
        bus.publish(Event::Game(GameEvent::ViewerRebuilt));

        assert!(matches!(
            audio.try_recv(),
            Ok(Event::Game(GameEvent::Sound { .. }))
        ));
        assert!(audio.try_recv().is_err());
        assert!(matches!(
            render.try_recv(),
            Ok(Event::Game(GameEvent::ViewerRebuilt))
        ));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::new().publish(Event::Net(NetEvent::UpdateSent { round: 1 }));
    }
}
