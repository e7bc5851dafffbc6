//! Typed simulation events with pre-allocated ring buffers.
//!
//! Events are emitted while a tick runs and delivered in batch at the end of
//! the tick. Each event kind has its own [`EventBuffer`] with a fixed
//! capacity; when a buffer is full the oldest event is dropped.
//!
//! Listeners are passive: they observe events and cannot mutate the engine.
//! Edits that react to events go through the edit command queue instead.
//! The events of the most recent delivery stay readable through
//! [`EventBus::last_delivered`] until the next tick. Every delivery of the
//! current frame is also kept, grouped by tick, in the frame log
//! ([`EventBus::frame_deliveries`]).
//!
//! Suppressed kinds are never buffered and cost nothing.

use crate::fixed::Ticks;
use crate::id::*;
use crate::node::NodeKind;
use crate::part::Quality;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why a part left the simulation without reaching a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Arrived at a buffer that was at capacity.
    BufferFull { node: NodeId },
    /// Was queued at or held by a node that got deleted.
    NodeDeleted { node: NodeId },
    /// Was travelling on an edge whose endpoint no longer exists.
    DanglingEdge { edge: EdgeId },
    /// Had to leave a node that has no outgoing edge.
    NoRoute { node: NodeId },
}

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Parts --
    PartSpawned {
        part: PartId,
        node: NodeId,
        quality: Quality,
        tick: Ticks,
    },
    PartArrived {
        part: PartId,
        node: NodeId,
        tick: Ticks,
    },
    ProcessingStarted {
        part: PartId,
        node: NodeId,
        tick: Ticks,
    },
    ProcessingFinished {
        part: PartId,
        node: NodeId,
        tick: Ticks,
    },
    PartReworked {
        part: PartId,
        node: NodeId,
        tick: Ticks,
    },
    PartCompleted {
        part: PartId,
        node: NodeId,
        quality: Quality,
        tick: Ticks,
    },
    PartDropped {
        part: PartId,
        reason: DropReason,
        tick: Ticks,
    },

    // -- Machines --
    MachineDown {
        node: NodeId,
        tick: Ticks,
    },

    // -- Graph --
    NodeAdded {
        node: NodeId,
        kind: NodeKind,
        tick: Ticks,
    },
    NodeRemoved {
        node: NodeId,
        tick: Ticks,
    },
    EdgeAdded {
        edge: EdgeId,
        from: NodeId,
        to: NodeId,
        tick: Ticks,
    },
    EdgeRemoved {
        edge: EdgeId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PartSpawned,
    PartArrived,
    ProcessingStarted,
    ProcessingFinished,
    PartReworked,
    PartCompleted,
    PartDropped,
    MachineDown,
    NodeAdded,
    NodeRemoved,
    EdgeAdded,
    EdgeRemoved,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PartSpawned { .. } => EventKind::PartSpawned,
            Event::PartArrived { .. } => EventKind::PartArrived,
            Event::ProcessingStarted { .. } => EventKind::ProcessingStarted,
            Event::ProcessingFinished { .. } => EventKind::ProcessingFinished,
            Event::PartReworked { .. } => EventKind::PartReworked,
            Event::PartCompleted { .. } => EventKind::PartCompleted,
            Event::PartDropped { .. } => EventKind::PartDropped,
            Event::MachineDown { .. } => EventKind::MachineDown,
            Event::NodeAdded { .. } => EventKind::NodeAdded,
            Event::NodeRemoved { .. } => EventKind::NodeRemoved,
            Event::EdgeAdded { .. } => EventKind::EdgeAdded,
            Event::EdgeRemoved { .. } => EventKind::EdgeRemoved,
        }
    }

    /// The tick at which the event occurred.
    pub fn tick(&self) -> Ticks {
        match self {
            Event::PartSpawned { tick, .. }
            | Event::PartArrived { tick, .. }
            | Event::ProcessingStarted { tick, .. }
            | Event::ProcessingFinished { tick, .. }
            | Event::PartReworked { tick, .. }
            | Event::PartCompleted { tick, .. }
            | Event::PartDropped { tick, .. }
            | Event::MachineDown { tick, .. }
            | Event::NodeAdded { tick, .. }
            | Event::NodeRemoved { tick, .. }
            | Event::EdgeAdded { tick, .. }
            | Event::EdgeRemoved { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    /// Clear stored events. The lifetime total is kept.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type Listener = Box<dyn FnMut(&Event)>;

/// One ring buffer per event kind, listener lists, suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<Listener>; EVENT_KIND_COUNT],
    /// Events handed out by the most recent `deliver`, in emission order.
    delivered: Vec<Event>,
    /// Every delivery since the frame began, back to back.
    frame_log: Vec<Event>,
    /// `(tick, end index into frame_log)` per closed tick this frame.
    frame_ticks: Vec<(Ticks, usize)>,
    frame: u64,
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("delivered", &self.delivered.len())
            .field("frame", &self.frame)
            .field("frame_log", &self.frame_log.len())
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            delivered: Vec::new(),
            frame_log: Vec::new(),
            frame_ticks: Vec::new(),
            frame: 0,
            default_capacity,
        }
    }

    /// Suppress an event kind and drop its buffer.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event until the next delivery. No-op if suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener for an event kind. Listeners run in registration order.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Hand buffered events to listeners and clear the buffers.
    ///
    /// Events are delivered in tick order. Within a tick they are grouped by
    /// kind, in emission order per kind.
    pub fn deliver(&mut self) {
        self.delivered.clear();
        for buffer in self.buffers.iter_mut().flatten() {
            self.delivered.extend(buffer.iter().cloned());
            buffer.clear();
        }
        self.delivered.sort_by_key(Event::tick);

        for event in &self.delivered {
            for listener in &mut self.listeners[event.kind().index()] {
                listener(event);
            }
        }
    }

    /// Events handed out by the most recent delivery.
    pub fn last_delivered(&self) -> &[Event] {
        &self.delivered
    }

    /// Start a new frame: forget the previous frame's log.
    pub fn begin_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.frame_log.clear();
        self.frame_ticks.clear();
    }

    /// Deliver as tick `tick` and append the delivery to the frame log.
    pub fn close_tick(&mut self, tick: Ticks) {
        self.deliver();
        self.frame_log.extend(self.delivered.iter().cloned());
        self.frame_ticks.push((tick, self.frame_log.len()));
    }

    /// Frames begun so far. Never reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The ticks closed in the current frame with the events delivered at
    /// each, oldest first.
    pub fn frame_deliveries(&self) -> impl Iterator<Item = (Ticks, &[Event])> + '_ {
        let mut start = 0;
        self.frame_ticks.iter().map(move |&(tick, end)| {
            let events = &self.frame_log[start..end];
            start = end;
            (tick, events)
        })
    }

    /// Count of events currently buffered for a kind.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }

    /// Clear all buffers, the last delivery and the frame log. Listeners,
    /// suppression and the frame counter stay.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        self.delivered.clear();
        self.frame_log.clear();
        self.frame_ticks.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
