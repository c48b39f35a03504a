//! Simulation events and the bus that delivers them.
//!
//! The world publishes a [`SimEvent`] for every change a presentation layer
//! might care about. Listeners registered with [`EventBus::subscribe`] are
//! called synchronously, in subscription order, before the mutating call
//! returns. Every event is also appended to a bounded log that pull-style
//! consumers (the harness, tests) empty with [`EventBus::drain`]; once full,
//! the oldest entries are dropped.
//!
//! The world applies its own reactions (room recomputation, graph
//! invalidation, job teardown) before publishing, so listeners only observe.

use std::collections::VecDeque;

use hecs::Entity;
use outpost_logic::geometry::TilePos;

use crate::components::{AdditionKind, JobId, JobKind, TileType};
use crate::systems::RoomId;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    TileTypeChanged {
        pos: TilePos,
        old: TileType,
        new: TileType,
    },
    AdditionChanged {
        pos: TilePos,
        old: Option<AdditionKind>,
        new: Option<AdditionKind>,
    },
    /// Work was applied to an addition (also fired with zero work to force a
    /// visual refresh). Carries the addition's current render state.
    AdditionWorkDone {
        pos: TilePos,
        render_state: String,
    },
    AdditionBuilt {
        pos: TilePos,
        kind: AdditionKind,
    },
    BorderChanged {
        pos: TilePos,
        defines_border: bool,
    },
    ItemStackChanged {
        pos: TilePos,
        item_type: Option<String>,
        count: u32,
    },
    RoomCreated(RoomId),
    RoomRemoved(RoomId),
    RoomDoorAdded {
        room: RoomId,
        pos: TilePos,
    },
    CharacterAdded(Entity),
    CharacterPositionChanged {
        character: Entity,
        x: f32,
        y: f32,
    },
    CharacterSelectionChanged {
        character: Entity,
        selected: bool,
    },
    JobQueueDiscovered(JobKind),
    JobEnqueued {
        job: JobId,
        kind: JobKind,
    },
    JobAssigned {
        job: JobId,
        character: Entity,
    },
    JobCompleted {
        job: JobId,
        kind: JobKind,
    },
    JobCancelled {
        job: JobId,
        kind: JobKind,
    },
    JobDeleted {
        job: JobId,
        kind: JobKind,
    },
    JobDestinationChanged {
        job: JobId,
        from: TilePos,
        to: TilePos,
    },
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SimEvent) + Send>;

/// Events kept for [`EventBus::drain`] by default.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    log: VecDeque<SimEvent>,
    log_capacity: usize,
    dropped: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose pull log keeps at most `capacity` events. Zero disables
    /// the log; listeners still receive everything.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            log: VecDeque::new(),
            log_capacity: capacity,
            dropped: 0,
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SimEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn publish(&mut self, event: SimEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
        if self.log_capacity == 0 {
            return;
        }
        if self.log.len() >= self.log_capacity {
            if self.dropped == 0 {
                log::debug!("event log full at {}, dropping oldest", self.log_capacity);
            }
            self.log.pop_front();
            self.dropped += 1;
        }
        self.log.push_back(event);
    }

    /// Take every event still in the log, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.log.drain(..).collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &SimEvent> {
        self.log.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.log.len()
    }

    /// Events pushed out of a full log since the bus was created.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_receive_in_order() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&seen);
        let second = Arc::clone(&seen);
        bus.subscribe(move |_| first.lock().unwrap().push(1));
        bus.subscribe(move |_| second.lock().unwrap().push(2));

        bus.publish(SimEvent::RoomCreated(RoomId(0)));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        let id = bus.subscribe(move |_| *c.lock().unwrap() += 1);

        bus.publish(SimEvent::RoomCreated(RoomId(0)));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(SimEvent::RoomRemoved(RoomId(0)));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_drain_empties_log() {
        let mut bus = EventBus::new();
        bus.publish(SimEvent::RoomCreated(RoomId(3)));
        assert_eq!(bus.pending_len(), 1);
        let drained = bus.drain();
        assert_eq!(drained, vec![SimEvent::RoomCreated(RoomId(3))]);
        assert_eq!(bus.pending().count(), 0);
    }

    #[test]
    fn test_full_log_drops_oldest() {
        let mut bus = EventBus::with_log_capacity(3);
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        bus.subscribe(move |_| *c.lock().unwrap() += 1);
        for i in 0..5 {
            bus.publish(SimEvent::RoomCreated(RoomId(i)));
        }

        assert_eq!(*count.lock().unwrap(), 5);
        assert_eq!(bus.dropped(), 2);
        let kept: Vec<_> = bus.drain();
        assert_eq!(
            kept,
            vec![
                SimEvent::RoomCreated(RoomId(2)),
                SimEvent::RoomCreated(RoomId(3)),
                SimEvent::RoomCreated(RoomId(4)),
            ]
        );
    }

    #[test]
    fn test_zero_capacity_disables_log() {
        let mut bus = EventBus::with_log_capacity(0);
        bus.publish(SimEvent::RoomCreated(RoomId(1)));
        assert_eq!(bus.pending_len(), 0);
        assert_eq!(bus.dropped(), 0);
    }
}
