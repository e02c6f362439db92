//! Counts unique vehicles and samples their speeds per detector, in contiguous fixed-length time
//! windows.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::registry::{DetectorId, Registry};
use crate::MPS_TO_MPH;

/// Looks up a vehicle's current speed. Speeds must be read the moment a vehicle is first seen --
/// they change every step -- so the accumulator asks for them inline rather than taking a
/// snapshot argument.
pub trait SpeedSource {
    /// Current speed in m/s, or None if the vehicle has already left the simulation. Vehicles can
    /// legitimately vanish between being seen on a detector and this lookup.
    fn speed(&self, vehicle: &str) -> Option<f64>;
}

/// One closed aggregation window for one detector.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntervalRecord {
    pub detector: DetectorId,
    /// Seconds; the window covers `[window_start, window_start + interval)`.
    pub window_start: f64,
    /// Distinct vehicles first seen during the window.
    pub vehicle_count: usize,
    /// veh/h, normalized from the window's count.
    pub flow_rate: f64,
    /// mph, arithmetic mean of the first-seen speed samples; 0 if the window saw no vehicles.
    pub mean_speed: f64,
}

#[derive(Debug, PartialEq)]
enum Phase {
    /// Waiting for a collection start time.
    Idle,
    Accumulating,
    Done,
}

struct DetectorState {
    /// Every vehicle ever attributed to this detector. A vehicle that sits on a detector for many
    /// steps, or passes it twice, counts once.
    counted: BTreeSet<String>,
    interval_count: usize,
    /// m/s samples, one per vehicle, taken when first seen this window.
    interval_speeds: Vec<f64>,
    /// None until the first observation after the collection start.
    window_start: Option<f64>,
}

/// The mutable per-run state of the pipeline. Feed it one `observe` call per detector per
/// simulation step; it hands back records as windows close.
pub struct IntervalAccumulator {
    interval: f64,
    phase: Phase,
    collection_start: Option<f64>,
    detectors: BTreeMap<DetectorId, DetectorState>,
}

impl IntervalAccumulator {
    pub fn new(registry: &Registry, interval: f64) -> IntervalAccumulator {
        assert!(interval > 0.0, "interval must be positive, got {}", interval);
        IntervalAccumulator {
            interval,
            phase: Phase::Idle,
            collection_start: None,
            detectors: registry
                .detector_ids()
                .map(|id| {
                    (
                        id.clone(),
                        DetectorState {
                            counted: BTreeSet::new(),
                            interval_count: 0,
                            interval_speeds: Vec::new(),
                            window_start: None,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Starts accumulation at `t`. The start is either configured up front or set by the scenario
    /// driver the moment a triggering event happens; either way it's set once. Later calls keep
    /// the first value.
    pub fn set_collection_start(&mut self, t: f64) {
        if let Some(existing) = self.collection_start {
            warn!(
                "collection start already set to {}s; ignoring {}s",
                existing, t
            );
            return;
        }
        info!("collection starts at {}s", t);
        self.collection_start = Some(t);
    }

    pub fn collection_start(&self) -> Option<f64> {
        self.collection_start
    }

    /// Accounts for the vehicles currently sitting on one detector at time `now`, and closes any
    /// windows that have elapsed. Usually returns nothing or one record; if the caller polled
    /// more coarsely than the interval length, the skipped windows come back as zero-count
    /// records so that consecutive records always stay `interval` apart.
    pub fn observe(
        &mut self,
        now: f64,
        detector: &DetectorId,
        present: &BTreeSet<String>,
        speeds: &impl SpeedSource,
    ) -> Vec<IntervalRecord> {
        if self.phase == Phase::Done {
            warn!("observation at {}s after the run finished; dropping", now);
            return Vec::new();
        }
        let start = match self.collection_start {
            Some(start) if now >= start => start,
            _ => {
                return Vec::new();
            }
        };
        self.phase = Phase::Accumulating;
        let interval = self.interval;

        let state = match self.detectors.get_mut(detector) {
            Some(state) => state,
            None => {
                warn!("observation for unregistered detector {}; dropping", detector);
                return Vec::new();
            }
        };
        if state.window_start.is_none() {
            state.window_start = Some(start);
        }

        for vehicle in present {
            if state.counted.contains(vehicle) {
                continue;
            }
            // Read the speed immediately; by the next step it'll be different.
            match speeds.speed(vehicle) {
                Some(speed) => {
                    state.interval_speeds.push(speed);
                }
                None => {
                    warn!(
                        "{} left the simulation before its speed could be read at {}",
                        vehicle, detector
                    );
                }
            }
            state.interval_count += 1;
            state.counted.insert(vehicle.clone());
        }

        let mut closed = Vec::new();
        while now >= state.window_start.unwrap() + interval {
            let window_start = state.window_start.unwrap();
            closed.push(IntervalRecord {
                detector: detector.clone(),
                window_start,
                vehicle_count: state.interval_count,
                flow_rate: (state.interval_count as f64) * 3600.0 / interval,
                mean_speed: mean_mph(&state.interval_speeds),
            });
            state.interval_count = 0;
            state.interval_speeds.clear();
            state.window_start = Some(window_start + interval);
        }
        closed
    }

    /// Ends the run. The partially accumulated window, if any, is discarded; only whole windows
    /// ever produce records.
    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }

    /// How many distinct vehicles this detector ever saw.
    pub fn distinct_vehicles(&self, detector: &DetectorId) -> usize {
        self.detectors
            .get(detector)
            .map(|state| state.counted.len())
            .unwrap_or(0)
    }
}

fn mean_mph(samples_mps: &[f64]) -> f64 {
    if samples_mps.is_empty() {
        return 0.0;
    }
    samples_mps.iter().sum::<f64>() / (samples_mps.len() as f64) * MPS_TO_MPH
}
