//! The parameter panel: run length, cost rates, quality rates and transport
//! speed.
//!
//! [`SimParams`] is the user-facing, serde-friendly form (plain f64). The
//! engine never reads it inside the tick loop; it reads the [`Rates`]
//! resolved from it whenever parameters change.

use crate::fixed::{Fixed64, Ticks, f64_to_fixed64};

// ---------------------------------------------------------------------------
// SimParams
// ---------------------------------------------------------------------------

/// Simulation parameters as edited by the user. Every field is defaulted, so
/// a partial params file is always valid.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Length of a run in simulated hours.
    pub simulated_hours: f64,
    /// How many ticks make one simulated hour.
    pub ticks_per_hour: Ticks,
    /// Target output in good-or-reworked units per simulated hour.
    pub target_rate_per_hour: f64,
    pub material_cost_per_unit: f64,
    /// Labor cost per busy machine per hour.
    pub labor_rate_per_hour: f64,
    /// Cost per placed machine per hour.
    pub machine_rate_per_hour: f64,
    pub overhead_rate_per_hour: f64,
    /// Probability a spawned part is defective.
    pub defect_rate: f64,
    /// Probability a defective part is reworked when a machine finishes it.
    pub rework_rate: f64,
    /// Rework pass length as a fraction of the machine's processing time.
    pub rework_time_fraction: f64,
    /// Per-tick probability a busy machine makes no progress.
    pub downtime_rate: f64,
    /// Capacity given to newly placed buffers. `None` is unbounded.
    pub buffer_capacity: Option<u32>,
    /// Edge fraction a part covers per tick at speed 1.
    pub transport_speed: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            simulated_hours: 8.0,
            ticks_per_hour: 3600,
            target_rate_per_hour: 20.0,
            material_cost_per_unit: 10.0,
            labor_rate_per_hour: 200.0,
            machine_rate_per_hour: 150.0,
            overhead_rate_per_hour: 50.0,
            defect_rate: 0.0,
            rework_rate: 0.0,
            rework_time_fraction: 0.5,
            downtime_rate: 0.0,
            buffer_capacity: None,
            transport_speed: 0.01,
        }
    }
}

fn parse_f64(raw: &str, fallback: f64) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => fallback,
    }
}

fn parse_capacity(raw: &str, fallback: Option<u32>) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("inf") || raw.eq_ignore_ascii_case("infinity") {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v.min(u32::MAX as f64) as u32),
        _ => fallback,
    }
}

impl SimParams {
    /// Apply form-style key/value pairs on top of `self`.
    ///
    /// Values that fail to parse keep their previous value; unknown keys are
    /// ignored.
    pub fn apply_pairs<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (key, raw) in pairs {
            match key.trim() {
                "simulated_hours" => self.simulated_hours = parse_f64(raw, self.simulated_hours),
                "ticks_per_hour" => {
                    let v = parse_f64(raw, self.ticks_per_hour as f64);
                    self.ticks_per_hour = if v >= 1.0 { v as Ticks } else { self.ticks_per_hour };
                }
                "target_rate_per_hour" => {
                    self.target_rate_per_hour = parse_f64(raw, self.target_rate_per_hour)
                }
                "material_cost_per_unit" => {
                    self.material_cost_per_unit = parse_f64(raw, self.material_cost_per_unit)
                }
                "labor_rate_per_hour" => {
                    self.labor_rate_per_hour = parse_f64(raw, self.labor_rate_per_hour)
                }
                "machine_rate_per_hour" => {
                    self.machine_rate_per_hour = parse_f64(raw, self.machine_rate_per_hour)
                }
                "overhead_rate_per_hour" => {
                    self.overhead_rate_per_hour = parse_f64(raw, self.overhead_rate_per_hour)
                }
                "defect_rate" => self.defect_rate = parse_f64(raw, self.defect_rate),
                "rework_rate" => self.rework_rate = parse_f64(raw, self.rework_rate),
                "rework_time_fraction" => {
                    self.rework_time_fraction = parse_f64(raw, self.rework_time_fraction)
                }
                "downtime_rate" => self.downtime_rate = parse_f64(raw, self.downtime_rate),
                "buffer_capacity" => {
                    self.buffer_capacity = parse_capacity(raw, self.buffer_capacity)
                }
                "transport_speed" => self.transport_speed = parse_f64(raw, self.transport_speed),
                other => tracing::debug!(key = other, "ignoring unknown parameter"),
            }
        }
    }

    /// Build parameters from key/value pairs on top of the defaults.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        params.apply_pairs(pairs);
        params
    }

    /// Convert to the fixed-point form the tick loop reads.
    pub fn resolve(&self) -> Rates {
        let ticks_per_hour = self.ticks_per_hour.max(1);
        Rates {
            run_ticks: hours_to_ticks(self.simulated_hours, ticks_per_hour),
            ticks_per_hour,
            hours_per_tick: Fixed64::ONE / Fixed64::saturating_from_num(ticks_per_hour),
            target_rate_per_hour: f64_to_fixed64(self.target_rate_per_hour),
            material_cost_per_unit: f64_to_fixed64(self.material_cost_per_unit),
            labor_rate_per_hour: f64_to_fixed64(self.labor_rate_per_hour),
            machine_rate_per_hour: f64_to_fixed64(self.machine_rate_per_hour),
            overhead_rate_per_hour: f64_to_fixed64(self.overhead_rate_per_hour),
            defect_rate: f64_to_fixed64(self.defect_rate),
            rework_rate: f64_to_fixed64(self.rework_rate),
            rework_time_fraction: f64_to_fixed64(self.rework_time_fraction.max(0.0)),
            downtime_rate: f64_to_fixed64(self.downtime_rate),
            transport_speed: f64_to_fixed64(self.transport_speed.max(0.0)),
        }
    }
}

fn hours_to_ticks(hours: f64, ticks_per_hour: Ticks) -> Ticks {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * ticks_per_hour as f64).round().min(u64::MAX as f64) as Ticks
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

/// Fixed-point parameters read by the tick loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rates {
    /// Ticks in one full run (`simulated_hours * ticks_per_hour`).
    pub run_ticks: Ticks,
    pub ticks_per_hour: Ticks,
    pub hours_per_tick: Fixed64,
    pub target_rate_per_hour: Fixed64,
    pub material_cost_per_unit: Fixed64,
    pub labor_rate_per_hour: Fixed64,
    pub machine_rate_per_hour: Fixed64,
    pub overhead_rate_per_hour: Fixed64,
    pub defect_rate: Fixed64,
    pub rework_rate: Fixed64,
    pub rework_time_fraction: Fixed64,
    pub downtime_rate: Fixed64,
    pub transport_speed: Fixed64,
}

impl Rates {
    /// Length of a rework pass for a machine with `processing_ticks`.
    /// Saturates at the largest representable tick count.
    pub fn rework_ticks(&self, processing_ticks: Ticks) -> Ticks {
        let scaled = Fixed64::saturating_from_num(processing_ticks)
            .saturating_mul(self.rework_time_fraction)
            .saturating_round();
        scaled.to_num::<i64>().max(1) as Ticks
    }
}

impl Default for Rates {
    fn default() -> Self {
        SimParams::default().resolve()
    }
}
