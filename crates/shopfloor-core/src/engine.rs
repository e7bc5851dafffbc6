//! The simulation engine: owns the factory graph, the live parts and the
//! accounting state, and runs the tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`FactoryGraph`] (nodes with their queues and machine state, edges)
//! - The live parts, in a `SlotMap` arena keyed by [`PartId`]
//! - [`SimParams`] and the fixed-point [`Rates`] resolved from them
//! - A [`CostLedger`], the HUD [`Metrics`] and a [`BottleneckPolicy`]
//! - An injectable [`RandomSource`] for defect, rework and downtime draws
//! - An [`EventBus`] and a [`CommandQueue`] of deferred edits
//!
//! # Frame and tick
//!
//! [`Engine::advance_frame`] applies queued edits, then (unless paused) runs
//! `speed` ticks. Each tick runs, in order:
//! 1. **Sources** -- advance spawn timers, spawn onto the first outgoing edge
//! 2. **Machines** -- count down, release finished parts, pick up new ones
//! 3. **Buffers** -- forward a queued part into a free successor machine
//! 4. **Transport** -- move parts along edges and deliver arrivals
//! 5. **Accounting** -- accrue time-based cost
//! 6. **Metrics** -- WIP and the bottleneck
//! 7. **Bookkeeping** -- deliver events, advance the tick counter
//!
//! Direct edit methods (`add_node`, `connect`, `remove_node`, ...) are only
//! ever called between ticks, so every edit is atomic with respect to the
//! pipeline.

use slotmap::SlotMap;

use crate::accounting::{CostLedger, RunSummary};
use crate::command::{CommandQueue, EditCommand};
use crate::event::{DropReason, Event, EventBus, EventKind, Listener};
use crate::fixed::{Fixed64, Ticks};
use crate::graph::{FactoryGraph, GraphError};
use crate::id::{EdgeId, NodeId, PartId};
use crate::inspect::{InspectorView, NodeEdit};
use crate::layout::{DefaultLayout, GridSnap, seed_default_layout};
use crate::metrics::{BottleneckPolicy, Metrics, WeightedScore, find_bottleneck};
use crate::node::{NodeKind, NodeParams, Position};
use crate::params::{Rates, SimParams};
use crate::part::{Part, PartState, Quality};
use crate::query::FrameSnapshot;
use crate::rng::{RandomSource, SimRng};
use crate::sim::{AdvanceResult, SimState, StateHash};

/// Seed used by [`Engine::new`] and [`Engine::with_params`].
pub const DEFAULT_SEED: u64 = 0x5EED;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The factory simulation. See the module docs for the tick pipeline.
#[derive(Debug)]
pub struct Engine {
    graph: FactoryGraph,

    /// Parts that have not reached a sink and have not been dropped.
    parts: SlotMap<PartId, Part>,
    next_part_serial: u64,

    params: SimParams,
    rates: Rates,

    /// Snapping applied to placed and moved nodes.
    pub grid: GridSnap,

    /// Tick counter, speed and pause flag.
    pub sim_state: SimState,

    ledger: CostLedger,
    metrics: Metrics,
    policy: Box<dyn BottleneckPolicy>,
    rng: Box<dyn RandomSource>,

    /// Typed event bus for simulation events.
    pub event_bus: EventBus,

    commands: CommandQueue,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An empty engine with default parameters.
    pub fn new() -> Self {
        Self::with_params(SimParams::default())
    }

    pub fn with_params(params: SimParams) -> Self {
        Self::with_seed(params, DEFAULT_SEED)
    }

    /// Seed the built-in [`SimRng`].
    pub fn with_seed(params: SimParams, seed: u64) -> Self {
        Self::with_rng(params, Box::new(SimRng::new(seed)))
    }

    /// Use a caller-supplied random source.
    pub fn with_rng(params: SimParams, rng: Box<dyn RandomSource>) -> Self {
        let rates = params.resolve();
        Self {
            graph: FactoryGraph::new(),
            parts: SlotMap::with_key(),
            next_part_serial: 1,
            params,
            rates,
            grid: GridSnap::default(),
            sim_state: SimState::new(),
            ledger: CostLedger::new(),
            metrics: Metrics::default(),
            policy: Box::new(WeightedScore::default()),
            rng,
            event_bus: EventBus::default(),
            commands: CommandQueue::new(),
        }
    }

    /// An engine holding the default starter line.
    pub fn with_default_layout(params: SimParams) -> Result<(Self, DefaultLayout), GraphError> {
        let mut engine = Self::with_params(params);
        let layout = seed_default_layout(&mut engine)?;
        Ok((engine, layout))
    }

    /// Replace the bottleneck scoring policy.
    pub fn set_policy(&mut self, policy: Box<dyn BottleneckPolicy>) {
        self.policy = policy;
        self.metrics.bottleneck = find_bottleneck(&self.graph, self.policy.as_ref());
    }

    /// Replace the random source.
    pub fn set_rng(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = rng;
    }

    /// Keep up to `max_history` applied commands.
    pub fn set_command_history(&mut self, max_history: usize) {
        self.commands = CommandQueue::with_max_history(max_history);
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &FactoryGraph {
        &self.graph
    }

    pub fn parts(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter()
    }

    pub fn part(&self, part: PartId) -> Option<&Part> {
        self.parts.get(part)
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    pub fn inspect(&self, node: NodeId) -> Option<InspectorView> {
        self.graph.node(node).map(|n| InspectorView::of(node, n))
    }

    /// Everything the rendering surface needs for one frame.
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot::capture(self)
    }

    /// Report for the run so far.
    pub fn run_summary(&self) -> RunSummary {
        RunSummary::new(&self.ledger, &self.rates, self.sim_state.tick)
    }

    // -----------------------------------------------------------------------
    // Clock controls
    // -----------------------------------------------------------------------

    pub fn pause(&mut self) {
        self.sim_state.paused = true;
    }

    pub fn resume(&mut self) {
        self.sim_state.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.sim_state.paused = !self.sim_state.paused;
    }

    pub fn is_paused(&self) -> bool {
        self.sim_state.paused
    }

    /// Ticks per frame; values below 1 are raised to 1.
    pub fn set_speed(&mut self, speed: u32) {
        self.sim_state.speed = speed.max(1);
    }

    pub fn speed(&self) -> u32 {
        self.sim_state.speed
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    /// Register a passive listener, called at the end of each tick.
    pub fn on_event(&mut self, kind: EventKind, listener: Listener) {
        self.event_bus.on(kind, listener);
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Place a node of `kind` with default parameters. Buffers take their
    /// capacity from the parameter panel.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> NodeId {
        let params = NodeParams {
            capacity: match kind {
                NodeKind::Buffer => self.params.buffer_capacity,
                _ => None,
            },
            ..NodeParams::default()
        };
        self.place_node(kind, position, params)
    }

    /// Place a node with explicit parameters. Durations are clamped to at
    /// least one tick.
    pub fn place_node(&mut self, kind: NodeKind, position: Position, mut params: NodeParams) -> NodeId {
        params.spawn_interval = params.spawn_interval.max(1);
        params.processing_ticks = params.processing_ticks.max(1);
        let position = self.grid.snap(position);
        let node = self.graph.add_node(kind, position, params);
        tracing::debug!(?kind, x = position.x, y = position.y, "node added");
        self.event_bus.emit(Event::NodeAdded {
            node,
            kind,
            tick: self.sim_state.tick,
        });
        self.refresh_metrics();
        node
    }

    /// Connect `from` to `to`. Parallel edges and cycles are allowed.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, GraphError> {
        let edge = self.graph.connect(from, to)?;
        self.event_bus.emit(Event::EdgeAdded {
            edge,
            from,
            to,
            tick: self.sim_state.tick,
        });
        Ok(edge)
    }

    /// Remove an edge. Parts travelling on it are dropped at the next
    /// transport phase.
    pub fn disconnect(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        self.graph.disconnect(edge)?;
        self.event_bus.emit(Event::EdgeRemoved {
            edge,
            tick: self.sim_state.tick,
        });
        Ok(())
    }

    /// Delete a node with its incident edges. Parts queued at or held by
    /// the node are dropped now; parts on its edges at the next transport
    /// phase.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        let removed = self.graph.remove_node(node)?;
        let label = removed.node.label();
        let tick = self.sim_state.tick;
        let held = removed.node.state.current;
        for part in removed.node.state.queue.into_iter().chain(held) {
            self.drop_part(part, DropReason::NodeDeleted { node }, tick);
        }
        for edge in removed.edges {
            self.event_bus.emit(Event::EdgeRemoved { edge, tick });
        }
        self.event_bus.emit(Event::NodeRemoved { node, tick });
        tracing::debug!(%label, "node removed");
        self.refresh_metrics();
        Ok(())
    }

    pub fn move_node(&mut self, node: NodeId, position: Position) -> Result<(), GraphError> {
        let position = self.grid.snap(position);
        let target = self
            .graph
            .node_mut(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        target.position = position;
        Ok(())
    }

    /// Inspector apply: position (snapped) and kind-specific parameters.
    pub fn edit_node(&mut self, node: NodeId, edit: &NodeEdit) -> Result<(), GraphError> {
        let mut edit = edit.clone();
        edit.position = edit.position.map(|p| self.grid.snap(p));
        let target = self
            .graph
            .node_mut(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        edit.apply(target);
        self.enforce_capacity(node);
        self.refresh_metrics();
        Ok(())
    }

    /// Replace the parameter panel. A changed buffer capacity is pushed to
    /// every buffer.
    pub fn set_params(&mut self, params: SimParams) {
        let capacity_changed = params.buffer_capacity != self.params.buffer_capacity;
        self.rates = params.resolve();
        self.params = params;
        if capacity_changed {
            for id in self.graph.ids_of_kind(NodeKind::Buffer) {
                if let Some(node) = self.graph.node_mut(id) {
                    node.params.capacity = self.params.buffer_capacity;
                }
                self.enforce_capacity(id);
            }
        }
    }

    /// Remove all nodes, edges and parts and zero every counter. Speed and
    /// the pause flag are kept.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.parts.clear();
        self.ledger = CostLedger::new();
        self.metrics = Metrics::default();
        self.sim_state.tick = 0;
        self.event_bus.clear_all();
        self.commands.clear_pending();
    }

    /// Clear and reseed the default starter line.
    pub fn reset(&mut self) -> Result<DefaultLayout, GraphError> {
        self.clear();
        tracing::info!("simulation reset");
        seed_default_layout(self)
    }

    // -----------------------------------------------------------------------
    // Deferred edits
    // -----------------------------------------------------------------------

    /// Queue an edit for the start of the next frame.
    pub fn submit(&mut self, command: EditCommand) {
        self.commands.push(command);
    }

    pub fn submit_batch(&mut self, commands: impl IntoIterator<Item = EditCommand>) {
        self.commands.push_batch(commands);
    }

    /// Apply all queued edits now. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        let commands = self.commands.drain(self.sim_state.tick);
        let count = commands.len();
        for command in commands {
            self.apply_command(command);
        }
        count
    }

    /// Apply one edit. Rejected edits are logged and have no effect.
    fn apply_command(&mut self, command: EditCommand) {
        let outcome = match command {
            EditCommand::AddNode { kind, position } => {
                self.add_node(kind, position);
                Ok(())
            }
            EditCommand::RemoveNode { node } => self.remove_node(node),
            EditCommand::Connect { from, to } => self.connect(from, to).map(|_| ()),
            EditCommand::Disconnect { edge } => self.disconnect(edge),
            EditCommand::MoveNode { node, position } => self.move_node(node, position),
            EditCommand::EditNode { node, edit } => self.edit_node(node, &edit),
            EditCommand::SetParams { params } => {
                self.set_params(params);
                Ok(())
            }
            EditCommand::Reset => self.reset().map(|_| ()),
        };
        if let Err(err) = outcome {
            tracing::debug!(%err, "edit ignored");
        }
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run one frame: apply queued edits, then `speed` ticks unless paused.
    /// The event bus's frame log holds every tick of this frame afterwards.
    pub fn advance_frame(&mut self) -> AdvanceResult {
        self.event_bus.begin_frame();
        let mut result = AdvanceResult {
            commands_applied: self.apply_pending(),
            ..AdvanceResult::default()
        };
        if self.sim_state.paused {
            return result;
        }
        for _ in 0..self.sim_state.speed {
            self.step_internal(&mut result);
        }
        result
    }

    /// Apply queued edits and run a single tick unless paused.
    pub fn step(&mut self) -> AdvanceResult {
        self.event_bus.begin_frame();
        let mut result = AdvanceResult {
            commands_applied: self.apply_pending(),
            ..AdvanceResult::default()
        };
        if !self.sim_state.paused {
            self.step_internal(&mut result);
        }
        result
    }

    /// Step `ticks` times. Each step is a frame of its own.
    pub fn run_ticks(&mut self, ticks: Ticks) -> AdvanceResult {
        let mut total = AdvanceResult::default();
        for _ in 0..ticks {
            let result = self.step();
            total.steps_run += result.steps_run;
            total.commands_applied += result.commands_applied;
        }
        total
    }

    // -----------------------------------------------------------------------
    // Internal: single tick
    // -----------------------------------------------------------------------

    fn step_internal(&mut self, result: &mut AdvanceResult) {
        // Events raised during the tick carry the number of the tick being run.
        let tick = self.sim_state.tick + 1;

        self.phase_sources(tick);
        self.phase_machines(tick);
        self.phase_buffers(tick);
        self.phase_transport(tick);
        self.phase_accounting();
        self.refresh_metrics();
        self.phase_bookkeeping(tick);

        result.steps_run += 1;
    }

    // -----------------------------------------------------------------------
    // Phase 1: Sources
    // -----------------------------------------------------------------------

    fn phase_sources(&mut self, tick: Ticks) {
        for id in self.graph.ids_of_kind(NodeKind::Source) {
            let Some(node) = self.graph.node_mut(id) else {
                continue;
            };
            node.state.spawn_timer += 1;
            if node.state.spawn_timer >= node.params.spawn_interval {
                node.state.spawn_timer = 0;
                self.spawn_part(id, tick);
            }
        }
    }

    fn spawn_part(&mut self, source: NodeId, tick: Ticks) {
        let Some(edge) = self.graph.first_output(source) else {
            tracing::trace!(tick, "source has no outgoing edge; nothing spawned");
            return;
        };
        let quality = if self.rng.chance(self.rates.defect_rate) {
            Quality::Defect
        } else {
            Quality::Good
        };
        let cost = self.ledger.record_spawn(&self.rates);
        let serial = self.next_part_serial;
        self.next_part_serial += 1;
        let part = self.parts.insert(Part::on_edge(serial, edge, quality, cost));
        self.event_bus.emit(Event::PartSpawned {
            part,
            node: source,
            quality,
            tick,
        });
    }

    // -----------------------------------------------------------------------
    // Phase 2: Machines
    // -----------------------------------------------------------------------

    fn phase_machines(&mut self, tick: Ticks) {
        for id in self.graph.ids_of_kind(NodeKind::Machine) {
            self.run_machine(id, tick);
        }
    }

    fn run_machine(&mut self, id: NodeId, tick: Ticks) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        if node.state.busy > 0 {
            if self.rng.chance(self.rates.downtime_rate) {
                node.state.downtime_ticks += 1;
                self.event_bus.emit(Event::MachineDown { node: id, tick });
            } else {
                node.state.busy -= 1;
            }
            if node.state.busy == 0 {
                self.finish_processing(id, tick);
            }
        }
        if self.graph.node(id).is_some_and(|n| n.state.is_free()) {
            self.pick_up(id, tick);
        }
    }

    /// The held part's countdown reached zero: rework it once if it is a
    /// defect and the draw succeeds, otherwise release it.
    fn finish_processing(&mut self, id: NodeId, tick: Ticks) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        let Some(part_id) = node.state.current else {
            return;
        };
        self.event_bus.emit(Event::ProcessingFinished {
            part: part_id,
            node: id,
            tick,
        });

        if let Some(part) = self.parts.get_mut(part_id)
            && part.quality == Quality::Defect
            && self.rng.chance(self.rates.rework_rate)
        {
            part.quality = Quality::Rework;
            node.state.busy = self.rates.rework_ticks(node.params.processing_ticks);
            node.state.reworking = true;
            self.ledger.record_rework();
            self.event_bus.emit(Event::PartReworked {
                part: part_id,
                node: id,
                tick,
            });
            return;
        }

        node.state.current = None;
        node.state.reworking = false;
        match self.graph.first_output(id) {
            Some(edge) => {
                if let Some(part) = self.parts.get_mut(part_id) {
                    part.depart(edge);
                }
            }
            None => self.drop_part(part_id, DropReason::NoRoute { node: id }, tick),
        }
    }

    /// Take one waiting part: from the first predecessor buffer with a
    /// non-empty queue, else from the machine's own queue.
    fn pick_up(&mut self, id: NodeId, tick: Ticks) {
        let from = self
            .graph
            .predecessors(id)
            .find(|&p| {
                self.graph
                    .node(p)
                    .is_some_and(|n| n.kind == NodeKind::Buffer && !n.state.queue.is_empty())
            })
            .unwrap_or(id);
        let Some(part_id) = self
            .graph
            .node_mut(from)
            .and_then(|n| n.state.queue.pop_front())
        else {
            return;
        };
        let Some(part) = self.parts.get_mut(part_id) else {
            return;
        };
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        part.state = PartState::Processing;
        part.edge = None;
        node.state.current = Some(part_id);
        node.state.busy = node.params.processing_ticks.max(1);
        node.state.reworking = false;
        self.event_bus.emit(Event::ProcessingStarted {
            part: part_id,
            node: id,
            tick,
        });
    }

    // -----------------------------------------------------------------------
    // Phase 3: Buffers
    // -----------------------------------------------------------------------

    fn phase_buffers(&mut self, tick: Ticks) {
        for id in self.graph.ids_of_kind(NodeKind::Buffer) {
            if self.graph.node(id).is_none_or(|n| n.state.queue.is_empty()) {
                continue;
            }
            let target = self.graph.successors(id).find(|&s| {
                self.graph
                    .node(s)
                    .is_some_and(|n| n.kind == NodeKind::Machine && n.state.is_free())
            });
            let Some(target) = target else {
                continue;
            };
            let Some(part) = self
                .graph
                .node_mut(id)
                .and_then(|n| n.state.queue.pop_front())
            else {
                continue;
            };
            if let Some(machine) = self.graph.node_mut(target) {
                machine.state.queue.push_back(part);
            }
            self.event_bus.emit(Event::PartArrived {
                part,
                node: target,
                tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Transport
    // -----------------------------------------------------------------------

    fn phase_transport(&mut self, tick: Ticks) {
        let step = self
            .rates
            .transport_speed
            .saturating_mul(Fixed64::saturating_from_num(self.sim_state.speed));

        // Spawn order, so simultaneous arrivals queue oldest first.
        let mut moving: Vec<(u64, PartId)> = self
            .parts
            .iter()
            .filter(|(_, p)| p.state == PartState::Moving)
            .map(|(id, p)| (p.serial, id))
            .collect();
        moving.sort_unstable();

        for (_, part) in moving {
            self.move_part(part, step, tick);
        }
    }

    fn move_part(&mut self, part_id: PartId, step: Fixed64, tick: Ticks) {
        let Some(edge) = self.parts.get(part_id).and_then(|p| p.edge) else {
            return;
        };
        let destination = self
            .graph
            .edge(edge)
            .map(|e| e.to)
            .filter(|&to| self.graph.contains_node(to));
        let Some(destination) = destination else {
            self.drop_part(part_id, DropReason::DanglingEdge { edge }, tick);
            return;
        };
        let arrived = self
            .parts
            .get_mut(part_id)
            .is_some_and(|p| p.advance(step));
        if arrived {
            self.deliver(part_id, destination, tick);
        }
    }

    /// Hand an arrived part to its destination according to the node kind.
    fn deliver(&mut self, part_id: PartId, destination: NodeId, tick: Ticks) {
        let Some(kind) = self.graph.node(destination).map(|n| n.kind) else {
            return;
        };
        match kind {
            NodeKind::Buffer | NodeKind::Machine => {
                let accepted = match self.graph.node_mut(destination) {
                    Some(node) if node.kind == NodeKind::Machine || node.has_room() => {
                        node.state.queue.push_back(part_id);
                        true
                    }
                    _ => false,
                };
                if !accepted {
                    self.drop_part(part_id, DropReason::BufferFull { node: destination }, tick);
                    return;
                }
                if let Some(part) = self.parts.get_mut(part_id) {
                    part.state = PartState::Waiting;
                    part.edge = None;
                }
                self.event_bus.emit(Event::PartArrived {
                    part: part_id,
                    node: destination,
                    tick,
                });
            }
            NodeKind::Sink => {
                let Some(part) = self.parts.remove(part_id) else {
                    return;
                };
                if let Some(node) = self.graph.node_mut(destination) {
                    node.state.completed += 1;
                }
                self.ledger.record_completion(part.quality);
                self.metrics.throughput += 1;
                self.event_bus.emit(Event::PartCompleted {
                    part: part_id,
                    node: destination,
                    quality: part.quality,
                    tick,
                });
            }
            NodeKind::Source => match self.graph.first_output(destination) {
                Some(next) => {
                    if let Some(part) = self.parts.get_mut(part_id) {
                        part.depart(next);
                    }
                }
                None => self.drop_part(part_id, DropReason::NoRoute { node: destination }, tick),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Phase 5: Accounting
    // -----------------------------------------------------------------------

    fn phase_accounting(&mut self) {
        let held_cost = self
            .rates
            .labor_rate_per_hour
            .saturating_add(self.rates.machine_rate_per_hour)
            .saturating_mul(self.rates.hours_per_tick);
        let machines = self.graph.ids_of_kind(NodeKind::Machine);
        let mut busy = 0;
        for &id in &machines {
            let Some(node) = self.graph.node_mut(id) else {
                continue;
            };
            let Some(part_id) = node.state.current else {
                continue;
            };
            busy += 1;
            node.state.busy_ticks += 1;
            if let Some(part) = self.parts.get_mut(part_id) {
                part.cost = part.cost.saturating_add(held_cost);
            }
        }
        self.ledger.accrue_tick(&self.rates, machines.len(), busy);
    }

    // -----------------------------------------------------------------------
    // Phase 6: Metrics
    // -----------------------------------------------------------------------

    fn refresh_metrics(&mut self) {
        self.metrics.wip = self.parts.len();
        self.metrics.bottleneck = find_bottleneck(&self.graph, self.policy.as_ref());
    }

    // -----------------------------------------------------------------------
    // Phase 7: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self, tick: Ticks) {
        self.event_bus.close_tick(tick);
        self.sim_state.tick = tick;
        tracing::trace!(
            tick,
            wip = self.metrics.wip,
            throughput = self.metrics.throughput,
            "tick complete"
        );
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Remove a part from the live set and record why.
    fn drop_part(&mut self, part: PartId, reason: DropReason, tick: Ticks) {
        if self.parts.remove(part).is_none() {
            return;
        }
        self.ledger.record_drop();
        self.metrics.wip = self.parts.len();
        tracing::debug!(?reason, tick, "part dropped");
        self.event_bus.emit(Event::PartDropped { part, reason, tick });
    }

    /// Drop parts from the back of a buffer queue until it fits its capacity.
    fn enforce_capacity(&mut self, node: NodeId) {
        let mut overflow = Vec::new();
        if let Some(buffer) = self.graph.node_mut(node)
            && buffer.kind == NodeKind::Buffer
            && let Some(cap) = buffer.params.capacity
        {
            while buffer.state.queue.len() > cap as usize {
                if let Some(part) = buffer.state.queue.pop_back() {
                    overflow.push(part);
                }
            }
        }
        let tick = self.sim_state.tick;
        for part in overflow {
            self.drop_part(part, DropReason::BufferFull { node }, tick);
        }
    }

    /// Deterministic fingerprint of the simulation state, excluding the
    /// random generator.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        for (_, node) in self.graph.nodes() {
            hasher.write_u32(node.serial.0);
            hasher.write_u64(node.state.spawn_timer);
            hasher.write_u64(node.state.busy);
            hasher.write_u64(node.state.completed);
            hasher.write_u64(node.state.queue.len() as u64);
            for part in node.state.queue.iter().chain(node.state.current.iter()) {
                hasher.write_u64(self.parts.get(*part).map_or(0, |p| p.serial));
            }
        }

        let mut parts: Vec<&Part> = self.parts.values().collect();
        parts.sort_unstable_by_key(|p| p.serial);
        for part in parts {
            hasher.write_u64(part.serial);
            hasher.write_u32(part.state as u32);
            hasher.write_u32(part.quality as u32);
            hasher.write_fixed64(part.progress);
            hasher.write_fixed64(part.cost);
        }

        hasher.write_u64(self.ledger.spawned);
        hasher.write_u64(self.ledger.produced);
        hasher.write_u64(self.ledger.defective);
        hasher.write_u64(self.ledger.reworked);
        hasher.write_u64(self.ledger.dropped);
        hasher.write_fixed64(self.ledger.total());
        hasher.finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
