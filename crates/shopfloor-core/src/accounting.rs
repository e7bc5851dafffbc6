//! Running cost and quality totals.
//!
//! The ledger is updated incrementally by the engine: material on every
//! spawn, time-based costs once per tick, quality counters as parts finish.
//! All arithmetic is saturating Q32.32.

use crate::fixed::{Fixed64, Ticks, fixed64_to_f64, ratio};
use crate::params::Rates;
use crate::part::Quality;

/// Running totals for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostLedger {
    pub material: Fixed64,
    pub labor: Fixed64,
    pub machine: Fixed64,
    pub overhead: Fixed64,
    /// Parts created by sources.
    pub spawned: u64,
    /// Parts consumed by sinks.
    pub produced: u64,
    /// Consumed parts still tagged defective.
    pub defective: u64,
    /// Rework passes started.
    pub reworked: u64,
    /// Parts lost to overflow, deletion or a missing route.
    pub dropped: u64,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge material for one spawned part. Returns the part's initial cost.
    pub fn record_spawn(&mut self, rates: &Rates) -> Fixed64 {
        self.spawned += 1;
        self.material = self.material.saturating_add(rates.material_cost_per_unit);
        rates.material_cost_per_unit
    }

    /// Accrue one tick of time-based cost.
    pub fn accrue_tick(&mut self, rates: &Rates, machines: usize, busy_machines: usize) {
        let h = rates.hours_per_tick;
        let machine_hours = h.saturating_mul(Fixed64::saturating_from_num(machines));
        let busy_hours = h.saturating_mul(Fixed64::saturating_from_num(busy_machines));
        self.machine = self
            .machine
            .saturating_add(rates.machine_rate_per_hour.saturating_mul(machine_hours));
        self.labor = self
            .labor
            .saturating_add(rates.labor_rate_per_hour.saturating_mul(busy_hours));
        self.overhead = self
            .overhead
            .saturating_add(rates.overhead_rate_per_hour.saturating_mul(h));
    }

    /// Count a part consumed by a sink.
    pub fn record_completion(&mut self, quality: Quality) {
        self.produced += 1;
        if quality == Quality::Defect {
            self.defective += 1;
        }
    }

    pub fn record_rework(&mut self) {
        self.reworked += 1;
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    /// Sum of all cost categories.
    pub fn total(&self) -> Fixed64 {
        self.material
            .saturating_add(self.labor)
            .saturating_add(self.machine)
            .saturating_add(self.overhead)
    }

    /// Produced units that are not defective.
    pub fn good_units(&self) -> u64 {
        self.produced - self.defective
    }

    /// Good units over produced units; zero before anything is produced.
    pub fn yield_ratio(&self) -> Fixed64 {
        ratio(self.good_units(), self.produced)
    }

    /// Total cost spread over good units; `None` before any good unit.
    pub fn cost_per_good_unit(&self) -> Option<Fixed64> {
        let good = self.good_units();
        if good == 0 {
            return None;
        }
        Some(self.total() / Fixed64::saturating_from_num(good))
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Report derived from the ledger and the parameter panel.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub elapsed_ticks: Ticks,
    pub elapsed_hours: f64,
    /// Elapsed time has reached `simulated_hours`.
    pub complete: bool,
    pub produced: u64,
    pub good_units: u64,
    pub defective: u64,
    pub yield_ratio: f64,
    /// Produced over the target for the elapsed time; zero when no target.
    pub target_attainment: f64,
    pub material_cost: f64,
    pub labor_cost: f64,
    pub machine_cost: f64,
    pub overhead_cost: f64,
    pub total_cost: f64,
    pub cost_per_good_unit: Option<f64>,
}

impl RunSummary {
    pub fn new(ledger: &CostLedger, rates: &Rates, elapsed_ticks: Ticks) -> Self {
        let elapsed_hours = elapsed_ticks as f64 / rates.ticks_per_hour as f64;
        let expected = fixed64_to_f64(rates.target_rate_per_hour) * elapsed_hours;
        let target_attainment = if expected > 0.0 {
            ledger.produced as f64 / expected
        } else {
            0.0
        };
        Self {
            elapsed_ticks,
            elapsed_hours,
            complete: elapsed_ticks >= rates.run_ticks,
            produced: ledger.produced,
            good_units: ledger.good_units(),
            defective: ledger.defective,
            yield_ratio: fixed64_to_f64(ledger.yield_ratio()),
            target_attainment,
            material_cost: fixed64_to_f64(ledger.material),
            labor_cost: fixed64_to_f64(ledger.labor),
            machine_cost: fixed64_to_f64(ledger.machine),
            overhead_cost: fixed64_to_f64(ledger.overhead),
            total_cost: fixed64_to_f64(ledger.total()),
            cost_per_good_unit: ledger.cost_per_good_unit().map(fixed64_to_f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SimParams;

    fn rates(ticks_per_hour: Ticks) -> Rates {
        SimParams {
            ticks_per_hour,
            material_cost_per_unit: 10.0,
            labor_rate_per_hour: 200.0,
            machine_rate_per_hour: 100.0,
            overhead_rate_per_hour: 50.0,
            ..SimParams::default()
        }
        .resolve()
    }

    #[test]
    fn one_hour_of_time_costs() {
        let rates = rates(4);
        let mut ledger = CostLedger::new();
        for _ in 0..4 {
            ledger.accrue_tick(&rates, 2, 1);
        }
        assert_eq!(ledger.machine, Fixed64::from_num(200));
        assert_eq!(ledger.labor, Fixed64::from_num(200));
        assert_eq!(ledger.overhead, Fixed64::from_num(50));
    }

    #[test]
    fn spawn_charges_material() {
        let rates = rates(4);
        let mut ledger = CostLedger::new();
        assert_eq!(ledger.record_spawn(&rates), Fixed64::from_num(10));
        ledger.record_spawn(&rates);
        assert_eq!(ledger.spawned, 2);
        assert_eq!(ledger.material, Fixed64::from_num(20));
    }

    #[test]
    fn quality_counters() {
        let mut ledger = CostLedger::new();
        ledger.record_completion(Quality::Good);
        ledger.record_completion(Quality::Rework);
        ledger.record_completion(Quality::Defect);
        assert_eq!(ledger.produced, 3);
        assert_eq!(ledger.defective, 1);
        assert_eq!(ledger.good_units(), 2);
    }

    #[test]
    fn cost_per_good_unit_needs_output() {
        let rates = rates(4);
        let mut ledger = CostLedger::new();
        ledger.record_spawn(&rates);
        assert_eq!(ledger.cost_per_good_unit(), None);
        ledger.record_completion(Quality::Good);
        ledger.record_completion(Quality::Good);
        assert_eq!(ledger.cost_per_good_unit(), Some(Fixed64::from_num(5)));
    }

    #[test]
    fn summary_attainment_and_completion() {
        let rates = SimParams {
            simulated_hours: 1.0,
            ticks_per_hour: 10,
            target_rate_per_hour: 4.0,
            ..SimParams::default()
        }
        .resolve();
        let mut ledger = CostLedger::new();
        ledger.record_completion(Quality::Good);
        ledger.record_completion(Quality::Good);

        let half = RunSummary::new(&ledger, &rates, 5);
        assert!(!half.complete);
        assert_eq!(half.target_attainment, 1.0);

        let done = RunSummary::new(&ledger, &rates, 10);
        assert!(done.complete);
        assert_eq!(done.target_attainment, 0.5);
        assert_eq!(done.yield_ratio, 1.0);
    }
}
