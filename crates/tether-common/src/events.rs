use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::{BlockId, SessionId};

/// Change notifications published by the shell state.
///
/// Every event carries the state `version` it was produced at, so a consumer
/// that lagged behind can tell it missed updates and re-read the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    SessionCreated { session: SessionId, version: u64 },
    SessionClosed { session: SessionId, version: u64 },
    SessionSelected { session: Option<SessionId>, version: u64 },
    SessionUpdated { session: SessionId, version: u64 },
    SessionDeleted { session: SessionId, version: u64 },
    OutputAppended { session: SessionId, bytes: usize, version: u64 },
    BlocksChanged { session: SessionId, blocks: Vec<BlockId>, version: u64 },
    OutputCleared { session: SessionId, version: u64 },
    CommandQueued { session: SessionId, version: u64 },
    ControlQueued { session: SessionId, byte: u8, version: u64 },
    FavoritesChanged { version: u64 },
    Persisted { ok: bool },
    Shutdown,
    #[serde(other)]
    Unknown,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::FavoritesChanged { version: 3 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, Event::FavoritesChanged { version: 3 });
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::Shutdown);

        assert!(matches!(rx1.recv().await.unwrap(), Event::Shutdown));
        assert!(matches!(rx2.recv().await.unwrap(), Event::Shutdown));
    }

    #[tokio::test]
    async fn session_events_arrive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let sid = SessionId::from("s1");

        bus.publish(Event::SessionCreated {
            session: sid.clone(),
            version: 1,
        });
        bus.publish(Event::OutputAppended {
            session: sid.clone(),
            bytes: 5,
            version: 2,
        });
        bus.publish(Event::SessionClosed {
            session: sid.clone(),
            version: 3,
        });

        assert!(matches!(rx.recv().await.unwrap(), Event::SessionCreated { version: 1, .. }));
        assert!(
            matches!(rx.recv().await.unwrap(), Event::OutputAppended { bytes: 5, version: 2, .. })
        );
        assert!(matches!(rx.recv().await.unwrap(), Event::SessionClosed { version: 3, .. }));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Event::Shutdown), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = EventBus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.publish(Event::Shutdown), 1);
    }

    #[test]
    fn unknown_event_deserializes() {
        let json = r#"{"type":"SomeNewEventWeNeverHeardOf","data":null}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(matches!(event, Event::Unknown));
    }
}
