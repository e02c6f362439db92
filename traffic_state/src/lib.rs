//! Turns raw per-step detector observations into interval measurements and Level-of-Service
//! classifications.
//!
//! The pipeline has four stages, each feeding the next:
//!
//! 1. [`Registry`] groups individual lane detectors into logical road cross-sections.
//! 2. [`IntervalAccumulator`] counts unique vehicles and samples their speeds per detector over
//!    fixed time windows, emitting one [`IntervalRecord`] per closed window.
//! 3. [`combine`] merges the interval records of each cross-section's detectors into one
//!    [`CrossSectionRecord`] per window.
//! 4. [`classify`] maps flow and speed to a volume/capacity ratio, a Level-of-Service letter
//!    grade, and a Speed Performance Index.
//!
//! The whole thing is single-threaded and driven by one external stepping loop; all mutable state
//! lives in the accumulator instantiated for a run.

#[macro_use]
extern crate log;

pub use self::accumulate::{IntervalAccumulator, IntervalRecord, SpeedSource};
pub use self::combine::{combine, CrossSectionRecord};
pub use self::registry::{CrossSectionId, DetectorId, Registry};

pub mod accumulate;
pub mod classify;
pub mod combine;
pub mod registry;

/// m/s to mph. Detector speed samples arrive in m/s; all reported speeds are mph.
pub const MPS_TO_MPH: f64 = 2.23694;

/// How cross-section mean speed is combined from the constituent detectors' interval means. The
/// research scripts this pipeline replaces used both at different times, so the choice stays
/// configurable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpeedCombination {
    /// `Σ(mean_speed_i * vehicle_count_i) / Σ(vehicle_count_i)`; 0 when no vehicles.
    VehicleWeighted,
    /// Unweighted arithmetic mean of the detectors' interval means.
    SimpleMean,
}

impl std::str::FromStr for SpeedCombination {
    type Err = String;

    fn from_str(x: &str) -> Result<SpeedCombination, String> {
        match x {
            "weighted" => Ok(SpeedCombination::VehicleWeighted),
            "simple" => Ok(SpeedCombination::SimpleMean),
            _ => Err(format!(
                "unknown speed combination {}; use weighted or simple",
                x
            )),
        }
    }
}

/// Per-run parameters shared by the accumulator, combiner, and classifier.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Length of one aggregation window, in seconds.
    pub interval: f64,
    /// Maximum capacity of one lane, in vehicles/hour.
    pub road_capacity_per_lane: f64,
    /// Free-flow speed in mph; the SPI denominator.
    pub free_flow_speed: f64,
    pub speed_combination: SpeedCombination,
}

impl Default for EngineConfig {
    /// The values used across the motorway scenarios: 5 minute windows, 2200 veh/h/lane, 70 mph.
    fn default() -> EngineConfig {
        EngineConfig {
            interval: 300.0,
            road_capacity_per_lane: 2200.0,
            free_flow_speed: 70.0,
            speed_combination: SpeedCombination::VehicleWeighted,
        }
    }
}
