//! The query/command interface the driver uses to talk to a traffic simulation. The pipeline
//! never sees vehicle dynamics; it only asks who's where and occasionally issues a command.

use std::collections::BTreeSet;

use anyhow::Result;

use traffic_state::{DetectorId, SpeedSource};

/// One vehicle's state this step, as much of it as the driver ever needs.
#[derive(Clone, Debug)]
pub struct VehicleState {
    pub id: String,
    /// Full lane id, e.g. `E1_0`.
    pub lane: String,
    /// Distance along the lane, meters.
    pub pos: f64,
    /// m/s
    pub speed: f64,
    pub vehicle_type: Option<String>,
}

impl VehicleState {
    /// The edge a lane belongs to: `E1_0` -> `E1`. Lane ids without an index are their own edge.
    pub fn edge(&self) -> &str {
        match self.lane.rfind('_') {
            Some(idx) => &self.lane[..idx],
            None => &self.lane,
        }
    }
}

/// Commands a scenario can issue against a vehicle. Backends that can't honor a command return an
/// error; the driver disables the offending policy and keeps going.
#[derive(Clone, Debug, PartialEq)]
pub enum VehicleCommand {
    SetSpeed {
        vehicle: String,
        /// m/s
        speed: f64,
    },
    /// Smoothly brake/accelerate to a target speed over a duration.
    SlowDown {
        vehicle: String,
        /// m/s
        target_speed: f64,
        /// seconds
        duration: f64,
    },
    SetMaxSpeed {
        vehicle: String,
        /// m/s
        speed: f64,
    },
    ChangeLane {
        vehicle: String,
        /// 0 is the rightmost lane
        lane_index: usize,
        /// seconds the lane choice is pinned for
        duration: f64,
    },
    /// Turn off the simulator's collision-avoidance and lane-change checks for one vehicle, so a
    /// staged attack maneuver isn't overridden.
    DisableSafetyChecks {
        vehicle: String,
    },
    Remove {
        vehicle: String,
    },
}

/// A stepped traffic simulation, queried strictly sequentially by one driver loop.
pub trait Simulator {
    /// Advances one timestep and returns the new simulation time, or None when the run is over.
    fn advance(&mut self) -> Option<f64>;
    /// Current simulation time, in seconds.
    fn time(&self) -> f64;
    /// Ids of the vehicles occupying a detector this step.
    fn vehicles_at(&self, detector: &DetectorId) -> BTreeSet<String>;
    /// A vehicle's current state, or None if it isn't (or is no longer) in the simulation.
    fn vehicle(&self, id: &str) -> Option<VehicleState>;
    /// All vehicles currently in the simulation.
    fn vehicle_ids(&self) -> Vec<String>;
    fn apply(&mut self, cmd: VehicleCommand) -> Result<()>;
}

/// Adapts a `Simulator` to the accumulator's speed-lookup seam.
pub struct SimSpeeds<'a>(pub &'a dyn Simulator);

impl<'a> SpeedSource for SimSpeeds<'a> {
    fn speed(&self, vehicle: &str) -> Option<f64> {
        self.0.vehicle(vehicle).map(|state| state.speed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_of_lane() {
        let v = VehicleState {
            id: "ego".to_string(),
            lane: "104359041_0".to_string(),
            pos: 0.0,
            speed: 0.0,
            vehicle_type: None,
        };
        assert_eq!(v.edge(), "104359041");
        let weird = VehicleState {
            lane: "junction".to_string(),
            ..v
        };
        assert_eq!(weird.edge(), "junction");
    }
}
