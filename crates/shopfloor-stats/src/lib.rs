//! Rolling production statistics for the shop floor simulation.
//!
//! [`ProductionStats`] consumes the events the engine delivers at the end of
//! each tick and keeps windowed counters on top of them: line throughput,
//! spawn and drop rates, first-pass yield, per-sink completion rates and
//! per-machine utilization.
//!
//! # Usage
//!
//! ```ignore
//! let mut stats = ProductionStats::new(StatsConfig::default());
//! loop {
//!     engine.advance_frame();
//!     stats.observe(&engine);
//! }
//! ```
//!
//! Callers that forward events themselves use
//! [`process_event`](ProductionStats::process_event) followed by one
//! [`end_tick`](ProductionStats::end_tick) per tick.

mod window;

use std::collections::HashMap;

use shopfloor_core::engine::Engine;
use shopfloor_core::event::Event;
use shopfloor_core::fixed::{Fixed64, Ticks};
use shopfloor_core::id::NodeId;
use shopfloor_core::part::Quality;

pub use window::RingBuffer;
use window::RollingWindow;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Window size in ticks for rolling rates.
    pub window_size: Ticks,
    /// Samples retained per history series.
    pub history_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            history_capacity: 256,
        }
    }
}

impl StatsConfig {
    fn window(&self) -> usize {
        usize::try_from(self.window_size).unwrap_or(usize::MAX).max(1)
    }
}

// ---------------------------------------------------------------------------
// Per-machine statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MachineStats {
    busy_ticks: RollingWindow,
    breakdowns: RollingWindow,
    reworks: RollingWindow,
    holding: bool,
    started: bool,
    finished: bool,
    reworked: bool,
}

impl MachineStats {
    fn new(window_size: usize) -> Self {
        Self {
            busy_ticks: RollingWindow::new(window_size),
            breakdowns: RollingWindow::new(window_size),
            reworks: RollingWindow::new(window_size),
            holding: false,
            started: false,
            finished: false,
            reworked: false,
        }
    }

    /// Resolve the tick's flags into the holding state. Within a tick the
    /// engine releases (or reworks) before it picks up the next part.
    fn end_tick(&mut self) {
        if self.finished && !self.reworked {
            self.holding = false;
        }
        if self.started {
            self.holding = true;
        }
        if self.holding {
            self.busy_ticks.add(1);
        }
        self.busy_ticks.commit();
        self.breakdowns.commit();
        self.reworks.commit();
        self.started = false;
        self.finished = false;
        self.reworked = false;
    }

    fn utilization(&self) -> Fixed64 {
        self.busy_ticks.rate()
    }
}

// ---------------------------------------------------------------------------
// Per-sink statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SinkStats {
    completions: RollingWindow,
    history: RingBuffer,
}

impl SinkStats {
    fn new(window_size: usize, history_capacity: usize) -> Self {
        Self {
            completions: RollingWindow::new(window_size),
            history: RingBuffer::new(history_capacity),
        }
    }

    fn end_tick(&mut self) {
        self.completions.commit();
        self.history.push(self.completions.rate());
    }
}

// ---------------------------------------------------------------------------
// Line-wide statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LineStats {
    spawned: RollingWindow,
    completed: RollingWindow,
    good: RollingWindow,
    dropped: RollingWindow,
    throughput_history: RingBuffer,
}

impl LineStats {
    fn new(window_size: usize, history_capacity: usize) -> Self {
        Self {
            spawned: RollingWindow::new(window_size),
            completed: RollingWindow::new(window_size),
            good: RollingWindow::new(window_size),
            dropped: RollingWindow::new(window_size),
            throughput_history: RingBuffer::new(history_capacity),
        }
    }

    fn end_tick(&mut self) {
        self.spawned.commit();
        self.completed.commit();
        self.good.commit();
        self.dropped.commit();
        self.throughput_history.push(self.completed.rate());
    }
}

// ---------------------------------------------------------------------------
// ProductionStats
// ---------------------------------------------------------------------------

/// Windowed production metrics fed by engine events.
#[derive(Debug, Clone)]
pub struct ProductionStats {
    config: StatsConfig,
    line: LineStats,
    machines: HashMap<NodeId, MachineStats>,
    sinks: HashMap<NodeId, SinkStats>,
    /// Last tick passed to `end_tick`.
    current_tick: Ticks,
    /// Engine frame last folded in by `observe`.
    observed_frame: Option<u64>,
}

impl ProductionStats {
    pub fn new(config: StatsConfig) -> Self {
        let line = LineStats::new(config.window(), config.history_capacity);
        Self {
            config,
            line,
            machines: HashMap::new(),
            sinks: HashMap::new(),
            current_tick: 0,
            observed_frame: None,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Ticks {
        self.current_tick
    }

    // -- Event processing ---------------------------------------------------

    /// Fold one event into the current tick.
    pub fn process_event(&mut self, event: &Event) {
        match event {
            Event::PartSpawned { .. } => self.line.spawned.add(1),

            Event::PartCompleted { node, quality, .. } => {
                self.line.completed.add(1);
                if *quality == Quality::Good {
                    self.line.good.add(1);
                }
                self.get_or_create_sink(*node).completions.add(1);
            }

            Event::PartDropped { .. } => self.line.dropped.add(1),

            Event::ProcessingStarted { node, .. } => {
                self.get_or_create_machine(*node).started = true;
            }

            Event::ProcessingFinished { node, .. } => {
                self.get_or_create_machine(*node).finished = true;
            }

            Event::PartReworked { node, .. } => {
                let machine = self.get_or_create_machine(*node);
                machine.reworked = true;
                machine.reworks.add(1);
            }

            Event::MachineDown { node, .. } => {
                self.get_or_create_machine(*node).breakdowns.add(1);
            }

            Event::NodeRemoved { node, .. } => self.remove_node(*node),

            _ => {}
        }
    }

    /// Close the tick: commit every window and append history samples.
    pub fn end_tick(&mut self, tick: Ticks) {
        self.current_tick = tick;
        self.line.end_tick();
        for machine in self.machines.values_mut() {
            machine.end_tick();
        }
        for sink in self.sinks.values_mut() {
            sink.end_tick();
        }
    }

    /// Fold in every tick of the engine's current frame, once per frame.
    ///
    /// Call after each `advance_frame` or `step`. A tick counter that went
    /// backwards means the engine was reset; the stats start over. Returns
    /// whether any tick was recorded.
    pub fn observe(&mut self, engine: &Engine) -> bool {
        let frame = engine.event_bus.frame();
        if self.observed_frame == Some(frame) {
            return false;
        }
        if engine.tick() < self.current_tick {
            self.clear();
        }
        self.observed_frame = Some(frame);

        let mut recorded = false;
        for (tick, events) in engine.event_bus.frame_deliveries() {
            if tick <= self.current_tick {
                self.clear();
                self.observed_frame = Some(frame);
            }
            for event in events {
                self.process_event(event);
            }
            self.end_tick(tick);
            recorded = true;
        }
        recorded
    }

    // -- Line queries -------------------------------------------------------

    /// Completions per tick over the window.
    pub fn get_throughput_rate(&self) -> Fixed64 {
        self.line.completed.rate()
    }

    pub fn get_spawn_rate(&self) -> Fixed64 {
        self.line.spawned.rate()
    }

    pub fn get_drop_rate(&self) -> Fixed64 {
        self.line.dropped.rate()
    }

    /// Share of completions in the window that were good, or `None` when
    /// nothing completed.
    pub fn get_window_yield(&self) -> Option<Fixed64> {
        let completed = self.line.completed.total();
        if completed == 0 {
            return None;
        }
        Some(Fixed64::saturating_from_num(self.line.good.total()) / Fixed64::saturating_from_num(completed))
    }

    pub fn get_completed_in_window(&self) -> u64 {
        self.line.completed.total()
    }

    /// Line throughput rate sampled at each `end_tick`, oldest first.
    pub fn get_throughput_history(&self) -> Vec<Fixed64> {
        self.line.throughput_history.to_vec()
    }

    // -- Per-node queries ---------------------------------------------------

    /// Completions per tick at one sink. Zero for untracked nodes.
    pub fn get_sink_rate(&self, sink: NodeId) -> Fixed64 {
        self.sinks
            .get(&sink)
            .map(|s| s.completions.rate())
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn get_sink_history(&self, sink: NodeId) -> Vec<Fixed64> {
        self.sinks
            .get(&sink)
            .map(|s| s.history.to_vec())
            .unwrap_or_default()
    }

    /// Fraction of windowed ticks a machine spent holding a part.
    pub fn get_utilization(&self, machine: NodeId) -> Fixed64 {
        self.machines
            .get(&machine)
            .map(MachineStats::utilization)
            .unwrap_or(Fixed64::ZERO)
    }

    pub fn get_breakdowns(&self, machine: NodeId) -> u64 {
        self.machines
            .get(&machine)
            .map(|m| m.breakdowns.total())
            .unwrap_or(0)
    }

    pub fn get_reworks(&self, machine: NodeId) -> u64 {
        self.machines.get(&machine).map(|m| m.reworks.total()).unwrap_or(0)
    }

    /// Tracked machine with the highest utilization. Ties go to the
    /// smaller node id.
    pub fn busiest_machine(&self) -> Option<(NodeId, Fixed64)> {
        self.machines
            .iter()
            .map(|(&id, m)| (id, m.utilization()))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }

    // -- Housekeeping -------------------------------------------------------

    pub fn remove_node(&mut self, node: NodeId) {
        self.machines.remove(&node);
        self.sinks.remove(&node);
    }

    /// Forget everything, including the tick counter.
    pub fn clear(&mut self) {
        self.line = LineStats::new(self.config.window(), self.config.history_capacity);
        self.machines.clear();
        self.sinks.clear();
        self.current_tick = 0;
        self.observed_frame = None;
    }

    pub fn tracked_machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn tracked_sink_count(&self) -> usize {
        self.sinks.len()
    }

    fn get_or_create_machine(&mut self, node: NodeId) -> &mut MachineStats {
        let window = self.config.window();
        self.machines
            .entry(node)
            .or_insert_with(|| MachineStats::new(window))
    }

    fn get_or_create_sink(&mut self, node: NodeId) -> &mut SinkStats {
        let window = self.config.window();
        let cap = self.config.history_capacity;
        self.sinks
            .entry(node)
            .or_insert_with(|| SinkStats::new(window, cap))
    }
}

impl Default for ProductionStats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
