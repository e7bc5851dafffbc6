//! Run a scene without a rendering surface and print the run summary.
//!
//! ```text
//! cargo run -p shopfloor-data --example headless_runner -- [scene_dir] [ticks]
//! RUST_LOG=shopfloor_core=debug cargo run -p shopfloor-data --example headless_runner
//! ```
//!
//! Without `ticks` the run lasts the params' simulated hours.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use shopfloor_core::fixed::Fixed64;
use shopfloor_core::id::NodeId;
use shopfloor_data::load_scene_dir;
use shopfloor_stats::{ProductionStats, StatsConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenes/default_line"));

    let mut scene = match load_scene_dir(&dir) {
        Ok(scene) => scene,
        Err(err) => {
            tracing::error!(%err, dir = %dir.display(), "could not load scene");
            return ExitCode::FAILURE;
        }
    };
    let engine = &mut scene.engine;

    let params = engine.params().clone();
    let planned = (params.simulated_hours * params.ticks_per_hour as f64).ceil() as u64;
    let ticks = args.next().and_then(|t| t.parse().ok()).unwrap_or(planned);

    let mut stats = ProductionStats::new(StatsConfig {
        window_size: params.ticks_per_hour,
        history_capacity: 256,
    });
    let report_every = params.ticks_per_hour.max(1);

    for _ in 0..ticks {
        engine.step();
        stats.observe(engine);
        if engine.tick() % report_every == 0 {
            let metrics = engine.metrics();
            tracing::info!(
                tick = engine.tick(),
                throughput = metrics.throughput,
                wip = metrics.wip,
                bottleneck = %metrics.bottleneck_label(),
                rate = %stats.get_throughput_rate(),
                "progress"
            );
        }
    }

    let summary = engine.run_summary();
    println!("ticks run          {}", summary.elapsed_ticks);
    println!("simulated hours    {:.2}", summary.elapsed_hours);
    println!("produced           {}", summary.produced);
    println!("good units         {}", summary.good_units);
    println!("defective          {}", summary.defective);
    println!("yield              {:.3}", summary.yield_ratio);
    println!("target attainment  {:.3}", summary.target_attainment);
    println!("total cost         {:.2}", summary.total_cost);
    match summary.cost_per_good_unit {
        Some(cost) => println!("cost / good unit   {cost:.2}"),
        None => println!("cost / good unit   -"),
    }
    println!("bottleneck         {}", engine.metrics().bottleneck_label());
    for (label, id) in sorted_labels(&scene.nodes) {
        let utilization = stats.get_utilization(id);
        if utilization > Fixed64::ZERO {
            println!("utilization {label:<8} {utilization:.3}");
        }
    }
    ExitCode::SUCCESS
}

fn sorted_labels(nodes: &HashMap<String, NodeId>) -> Vec<(&str, NodeId)> {
    let mut labels: Vec<_> = nodes.iter().map(|(l, &id)| (l.as_str(), id)).collect();
    labels.sort_unstable();
    labels
}
