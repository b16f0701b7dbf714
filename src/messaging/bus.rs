use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
/// Event bus for pub/sub messaging
///
/// The engine itself is single-threaded; the bus is the one piece that may
/// be shared with another thread (a monitor, a log view).
use std::sync::Arc;

use super::events::PlaybackEvent;
use crate::audio_system::PlayerId;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    /// Only events about this player, when set
    player: Option<PlayerId>,
    sender: Sender<PlaybackEvent>,
}

impl Subscriber {
    fn wants(&self, event: &PlaybackEvent) -> bool {
        match self.player {
            Some(player) => event.player() == Some(player),
            None => true,
        }
    }
}

/// Event bus broadcasting playback events to subscribers
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<RwLock<usize>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(RwLock::new(0)),
        }
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> (Receiver<PlaybackEvent>, SubscriberId) {
        self.add_subscriber(None)
    }

    /// Subscribe to events concerning one player
    pub fn subscribe_player(&self, player: PlayerId) -> (Receiver<PlaybackEvent>, SubscriberId) {
        self.add_subscriber(Some(player))
    }

    fn add_subscriber(&self, player: Option<PlayerId>) -> (Receiver<PlaybackEvent>, SubscriberId) {
        let (tx, rx) = unbounded();

        let mut next_id = self.next_id.write();
        let id = SubscriberId(*next_id);
        *next_id += 1;
        drop(next_id);

        self.subscribers.write().push(Subscriber {
            id,
            player,
            sender: tx,
        });

        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish to all interested subscribers. Subscribers whose receiver was
    /// dropped are removed.
    pub fn publish(&self, event: PlaybackEvent) {
        let mut disconnected = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter().filter(|s| s.wants(&event)) {
                if subscriber.sender.try_send(event.clone()).is_err() {
                    disconnected.push(subscriber.id);
                }
            }
        }

        if !disconnected.is_empty() {
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::AudioHandle;
    use std::time::Duration;

    fn played(player: u64) -> PlaybackEvent {
        PlaybackEvent::Played {
            handle: AudioHandle::new(PlayerId(player), 0, 0),
            clip: "a".to_string(),
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new();
        let (_rx, _id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_unsubscribe() {
        let bus = EventBus::new();
        let (_rx, id) = bus.subscribe();
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_publish() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();

        bus.publish(played(1));

        match rx.try_recv().unwrap() {
            PlaybackEvent::Played { clip, .. } => assert_eq!(clip, "a"),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_bus_player_filter() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe_player(PlayerId(2));

        bus.publish(played(1));
        bus.publish(played(2));

        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_event_bus_drops_closed_subscribers() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let (_keep, _id2) = bus.subscribe();
        drop(rx);

        bus.publish(played(1));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_clone() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let (_rx, _id) = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
