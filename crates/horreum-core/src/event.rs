//! Storage, trade and god events.
//!
//! Ledger, routing and worker-task phases emit events as they mutate the
//! city. The post-tick phase hands them in batch to passive listeners.
//! Each kind queues into its own bounded [`EventBuffer`].
//!
//! City-wide resource accounting and the figure factory hang off this bus:
//! accounting listens to [`Event::ResourceStored`] / [`Event::ResourceRemoved`],
//! and a cart-pusher is spawned for every [`Event::ShipmentDispatched`].
//!
//! # Suppression
//!
//! [`EventBus::suppress`] mutes a kind entirely: nothing is queued for it
//! and no buffer is allocated.

use std::collections::{VecDeque, vec_deque};

use crate::id::{BuildingId, TilePoint, TraderId};
use crate::resource::Resource;
use crate::sim::Ticks;
use crate::task::WorkerTask;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Direction of a trade exchange, seen from the trader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeDirection {
    /// Trader sold into city storage.
    SoldToCity,
    /// Trader bought out of city storage.
    BoughtFromCity,
}

/// Something that happened to city storage. Every variant records its tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Ledger --
    ResourceStored {
        building: BuildingId,
        resource: Resource,
        amount: u32,
        /// Produced locally rather than delivered from elsewhere.
        produced: bool,
        tick: Ticks,
    },
    ResourceRemoved {
        building: BuildingId,
        resource: Resource,
        amount: u32,
        tick: Ticks,
    },
    /// A cart-pusher leaves `building` for the city exit carrying `amount`.
    ShipmentDispatched {
        building: BuildingId,
        resource: Resource,
        amount: u32,
        tick: Ticks,
    },

    // -- Workers --
    WorkerTaskAssigned {
        building: BuildingId,
        task: WorkerTask,
        tick: Ticks,
    },

    // -- Trade --
    TraderRouted {
        trader: TraderId,
        building: BuildingId,
        tile: TilePoint,
        score: i64,
        tick: Ticks,
    },
    TraderLeaving {
        trader: TraderId,
        exit: TilePoint,
        tick: Ticks,
    },
    TradeExchanged {
        trader: TraderId,
        building: BuildingId,
        resource: Resource,
        amount: u32,
        direction: TradeDirection,
        tick: Ticks,
    },

    // -- Gods --
    GranaryBlessed {
        building: BuildingId,
        amount: u32,
        tick: Ticks,
    },
    StorageCursed {
        building: BuildingId,
        amount: u32,
        tick: Ticks,
    },
    BuildingSetOnFire {
        building: BuildingId,
        tick: Ticks,
    },
}

/// Payload-free tag of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResourceStored,
    ResourceRemoved,
    ShipmentDispatched,
    WorkerTaskAssigned,
    TraderRouted,
    TraderLeaving,
    TradeExchanged,
    GranaryBlessed,
    StorageCursed,
    BuildingSetOnFire,
}

const EVENT_KIND_COUNT: usize = 10;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ResourceStored { .. } => EventKind::ResourceStored,
            Event::ResourceRemoved { .. } => EventKind::ResourceRemoved,
            Event::ShipmentDispatched { .. } => EventKind::ShipmentDispatched,
            Event::WorkerTaskAssigned { .. } => EventKind::WorkerTaskAssigned,
            Event::TraderRouted { .. } => EventKind::TraderRouted,
            Event::TraderLeaving { .. } => EventKind::TraderLeaving,
            Event::TradeExchanged { .. } => EventKind::TradeExchanged,
            Event::GranaryBlessed { .. } => EventKind::GranaryBlessed,
            Event::StorageCursed { .. } => EventKind::StorageCursed,
            Event::BuildingSetOnFire { .. } => EventKind::BuildingSetOnFire,
        }
    }
}

impl EventKind {
    const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::ResourceStored,
        EventKind::ResourceRemoved,
        EventKind::ShipmentDispatched,
        EventKind::WorkerTaskAssigned,
        EventKind::TraderRouted,
        EventKind::TraderLeaving,
        EventKind::TradeExchanged,
        EventKind::GranaryBlessed,
        EventKind::StorageCursed,
        EventKind::BuildingSetOnFire,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Bounded per-kind log of events awaiting delivery.
///
/// Space is reserved up front. Pushing past capacity evicts the oldest entry
/// and counts it as lost.
#[derive(Debug)]
pub struct EventBuffer {
    queue: VecDeque<Event>,
    limit: usize,
    pushed: u64,
    lost: u64,
}

impl EventBuffer {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            queue: VecDeque::with_capacity(limit),
            limit,
            pushed: 0,
            lost: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.queue.len() == self.limit {
            self.queue.pop_front();
            self.lost += 1;
        }
        self.queue.push_back(event);
        self.pushed += 1;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events pushed since creation, evicted ones included.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, Event> {
        self.queue.iter()
    }

    fn take(&mut self) -> Vec<Event> {
        self.queue.drain(..).collect()
    }
}

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Pending events and listeners, grouped by [`EventKind`].
pub struct EventBus {
    pending: [Option<EventBuffer>; EVENT_KIND_COUNT],
    muted: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    limit: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listening: usize = self.listeners.iter().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("pending", &self.pending)
            .field("muted", &self.muted)
            .field("listeners", &listening)
            .finish()
    }
}

impl EventBus {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: Default::default(),
            muted: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            limit,
        }
    }

    /// Stop recording `kind`. Anything already pending for it is discarded.
    pub fn suppress(&mut self, kind: EventKind) {
        self.muted[kind.slot()] = true;
        self.pending[kind.slot()] = None;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.muted[kind.slot()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.muted[kind.slot()]
    }

    pub fn emit(&mut self, event: Event) {
        let slot = event.kind().slot();
        if self.muted[slot] {
            return;
        }
        let limit = self.limit;
        self.pending[slot]
            .get_or_insert_with(|| EventBuffer::new(limit))
            .push(event);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.slot()].push(listener);
    }

    /// Hand every pending event to the listeners of its kind, kinds in
    /// declaration order and listeners in registration order.
    pub fn deliver(&mut self) {
        for kind in EventKind::ALL {
            let slot = kind.slot();
            let Some(buffer) = self.pending[slot].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events = buffer.take();
            for listener in &mut self.listeners[slot] {
                for event in &events {
                    listener(event);
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.pending[kind.slot()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::pushed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
