//! The stepping loop: advances the simulation, lets the attack policies act, and feeds every
//! detector's occupancy into the accumulator. Strictly single-threaded and sequential; the only
//! thing that varies between scenarios is the simulator behind the trait and the policies.

use std::sync::atomic::{AtomicBool, Ordering};

use traffic_state::{IntervalAccumulator, IntervalRecord, Registry};

use crate::attack::AttackPolicy;
use crate::sim::{SimSpeeds, Simulator, VehicleCommand};

/// Remove a stalled vehicle once it has blocked the road for `duration` seconds after collection
/// started, imitating a breakdown being towed away.
pub struct BreakdownRemoval {
    pub vehicle: String,
    pub duration: f64,
}

pub struct RunConfig {
    pub breakdown: Option<BreakdownRemoval>,
    /// Stop stepping at this simulation time, if set; otherwise run the simulation out.
    pub end_time: Option<f64>,
}

/// Runs the scenario to completion (or interruption) and returns every interval record emitted.
/// An interrupt still returns everything accumulated so far, so the caller can flush results to
/// disk.
pub fn run(
    sim: &mut dyn Simulator,
    registry: &Registry,
    acc: &mut IntervalAccumulator,
    policies: &mut [Box<dyn AttackPolicy>],
    cfg: RunConfig,
    interrupted: &AtomicBool,
) -> Vec<IntervalRecord> {
    let detector_ids: Vec<_> = registry.detector_ids().cloned().collect();
    let mut disabled = vec![false; policies.len()];
    let mut towed = false;
    let mut records = Vec::new();

    while let Some(now) = sim.advance() {
        if interrupted.load(Ordering::Relaxed) {
            warn!("interrupted at {}s; keeping everything accumulated so far", now);
            break;
        }
        if cfg.end_time.map(|t| now >= t).unwrap_or(false) {
            break;
        }

        let vehicle_ids = sim.vehicle_ids();
        for (idx, policy) in policies.iter_mut().enumerate() {
            if disabled[idx] {
                continue;
            }
            for id in &vehicle_ids {
                let vehicle = match sim.vehicle(id) {
                    Some(vehicle) => vehicle,
                    None => {
                        // Removed earlier this very step
                        continue;
                    }
                };
                if policy.should_trigger(&vehicle) {
                    if let Err(err) = policy.apply_effect(sim, &vehicle) {
                        warn!("disabling policy {}: {}", policy.name(), err);
                        disabled[idx] = true;
                        break;
                    }
                }
            }
        }

        // The collection start is either configured up front or pinned to the first moment an
        // attack takes hold
        if acc.collection_start().is_none() {
            if let Some(t) = policies
                .iter()
                .filter_map(|policy| policy.triggered_at())
                .fold(None, |acc: Option<f64>, t| {
                    Some(acc.map_or(t, |best| best.min(t)))
                })
            {
                acc.set_collection_start(t);
            }
        }

        if let (Some(breakdown), Some(start), false) =
            (&cfg.breakdown, acc.collection_start(), towed)
        {
            if now >= start + breakdown.duration && sim.vehicle(&breakdown.vehicle).is_some() {
                if let Err(err) = sim.apply(VehicleCommand::Remove {
                    vehicle: breakdown.vehicle.clone(),
                }) {
                    warn!("couldn't remove {}: {}", breakdown.vehicle, err);
                }
                towed = true;
            }
        }

        for detector in &detector_ids {
            let present = sim.vehicles_at(detector);
            records.extend(acc.observe(now, detector, &present, &SimSpeeds(&*sim)));
        }
    }

    acc.finish();
    records
}
