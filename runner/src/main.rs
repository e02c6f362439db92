#[macro_use]
extern crate log;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use runner::attack::{AttackPolicy, StalledVehicleWatch};
use runner::driver::{self, BreakdownRemoval, RunConfig};
use runner::replay::FcdReplay;
use runner::{logger, output};
use sumo_xml::FcdTrace;
use traffic_state::{
    combine, DetectorId, EngineConfig, IntervalAccumulator, Registry, SpeedCombination,
};

#[derive(StructOpt)]
#[structopt(
    name = "runner",
    about = "Replays a recorded SUMO run through the detector aggregation pipeline"
)]
struct Args {
    /// Which run this is; rows are labelled with it. Run "attack" first, then "base" -- the base
    /// rows append to the same files.
    scenario: Scenario,
    /// The FCD trace of the run, from sumo --fcd-output
    #[structopt(long)]
    trace: String,
    /// The additional file declaring the e1 detectors
    #[structopt(long)]
    detectors: String,
    /// Aggregation window length, in seconds
    #[structopt(long, default_value = "300")]
    interval: u32,
    /// Road capacity of one lane, in veh/h
    #[structopt(long, default_value = "2200")]
    capacity: f64,
    /// Free-flow speed, in mph
    #[structopt(long, default_value = "70")]
    free_flow_speed: f64,
    /// How cross-section mean speed combines detector means: "weighted" (by vehicle count) or
    /// "simple"
    #[structopt(long, default_value = "weighted")]
    speed_combination: SpeedCombination,
    /// Start collecting at this simulation time. Leave unset in an attack run to start the
    /// moment the watched vehicle stalls; the chosen time is logged, so the matching base run
    /// can pass it here.
    #[structopt(long)]
    collection_start: Option<f64>,
    /// The vehicle whose stall marks the start of the attack
    #[structopt(long, default_value = "ego")]
    watch_vehicle: String,
    /// Only watch for the stall on this edge
    #[structopt(long)]
    watch_edge: Option<String>,
    /// Ignore stalls before this position along the edge, in meters
    #[structopt(long, default_value = "0")]
    watch_min_pos: f64,
    /// Remove the stalled vehicle this many seconds after collection starts, like a breakdown
    /// being towed
    #[structopt(long)]
    breakdown_duration: Option<f64>,
    /// Stop replaying at this simulation time
    #[structopt(long)]
    end_time: Option<f64>,
    /// The per-detector results table
    #[structopt(long, default_value = "detector_results.csv")]
    detector_output: String,
    /// The per-cross-section results table
    #[structopt(long, default_value = "cross_section_results.csv")]
    cross_section_output: String,
}

#[derive(Clone, Copy)]
enum Scenario {
    Attack,
    Base,
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(x: &str) -> Result<Scenario, String> {
        match x {
            "attack" => Ok(Scenario::Attack),
            "base" => Ok(Scenario::Base),
            _ => Err(format!("unknown scenario {}; use attack or base", x)),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scenario::Attack => write!(f, "attack"),
            Scenario::Base => write!(f, "base"),
        }
    }
}

fn main() -> Result<()> {
    logger::setup();
    let args = Args::from_args();

    let detectors = sumo_xml::load_detectors(&args.detectors)?;
    let registry = Registry::new(
        detectors
            .iter()
            .map(|det| DetectorId(det.id.clone()))
            .collect(),
    );
    info!(
        "{} detectors across {} cross-sections",
        registry.len(),
        registry
            .detector_ids()
            .filter_map(|id| registry.cross_section(id))
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );

    let trace = FcdTrace::load(&args.trace)?;
    let mut sim = FcdReplay::new(trace, &detectors);

    let cfg = EngineConfig {
        interval: args.interval as f64,
        road_capacity_per_lane: args.capacity,
        free_flow_speed: args.free_flow_speed,
        speed_combination: args.speed_combination,
    };
    let mut acc = IntervalAccumulator::new(&registry, cfg.interval);
    let mut policies: Vec<Box<dyn AttackPolicy>> = Vec::new();
    if let Some(t) = args.collection_start {
        acc.set_collection_start(t);
    } else {
        info!(
            "no --collection-start; watching for {} to stall",
            args.watch_vehicle
        );
        policies.push(Box::new(StalledVehicleWatch::new(
            &args.watch_vehicle,
            args.watch_edge.clone(),
            args.watch_min_pos,
        )));
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })?;

    let records = driver::run(
        &mut sim,
        &registry,
        &mut acc,
        &mut policies,
        RunConfig {
            breakdown: args.breakdown_duration.map(|duration| BreakdownRemoval {
                vehicle: args.watch_vehicle.clone(),
                duration,
            }),
            end_time: args.end_time,
        },
        &interrupted,
    );

    match acc.collection_start() {
        Some(t) => {
            // The base run needs the same start to be comparable
            info!(
                "collection started at {}s; pass --collection-start {} to the other run",
                t, t
            );
        }
        None => {
            warn!("collection never started; the watched vehicle never stalled. No rows written.");
            return Ok(());
        }
    }

    let scenario = args.scenario.to_string();
    let cross_sections = combine(&records, &registry, &cfg);
    output::append_csv(
        &args.detector_output,
        &output::detector_rows(&records, &cfg, &scenario),
    )?;
    output::append_csv(
        &args.cross_section_output,
        &output::cross_section_rows(&cross_sections, &scenario),
    )?;
    info!(
        "{} scenario done: {} interval records, {} cross-section records",
        scenario,
        records.len(),
        cross_sections.len()
    );
    Ok(())
}
