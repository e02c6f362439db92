//! The attack behaviors injected into a scenario. These are scenario parameters, not part of the
//! aggregation pipeline: the driver asks each policy about each vehicle each step and otherwise
//! knows nothing about what an "attack" is.

use anyhow::Result;

use crate::sim::{Simulator, VehicleCommand, VehicleState};

pub const MPH_TO_MPS: f64 = 0.44704;

/// A compromised-vehicle behavior. The driver calls `should_trigger` for every vehicle every
/// step, and `apply_effect` whenever it says yes.
pub trait AttackPolicy {
    fn name(&self) -> &'static str;
    fn should_trigger(&self, vehicle: &VehicleState) -> bool;
    fn apply_effect(&mut self, sim: &mut dyn Simulator, vehicle: &VehicleState) -> Result<()>;
    /// When the attack first took hold, once it has. The driver uses the earliest trigger across
    /// policies as the dynamic data-collection start.
    fn triggered_at(&self) -> Option<f64>;
}

/// Brakes one vehicle to a dead stop in a live lane: disable its safety checks, then a hard
/// `SlowDown` to zero. Fires once, when the vehicle first passes `trigger_pos` on `edge`.
pub struct EmergencyStop {
    pub vehicle: String,
    pub edge: String,
    /// Meters along the edge.
    pub trigger_pos: f64,
    /// m/s^2, used to pick the braking duration.
    pub deceleration: f64,
    triggered_at: Option<f64>,
}

impl EmergencyStop {
    pub fn new(vehicle: &str, edge: &str, trigger_pos: f64) -> EmergencyStop {
        EmergencyStop {
            vehicle: vehicle.to_string(),
            edge: edge.to_string(),
            trigger_pos,
            // Matches the scripted attacks: far harder than a comfortable service brake
            deceleration: 9.0,
            triggered_at: None,
        }
    }
}

impl AttackPolicy for EmergencyStop {
    fn name(&self) -> &'static str {
        "emergency-stop"
    }

    fn should_trigger(&self, vehicle: &VehicleState) -> bool {
        self.triggered_at.is_none()
            && vehicle.id == self.vehicle
            && vehicle.edge() == self.edge
            && vehicle.pos > self.trigger_pos
    }

    fn apply_effect(&mut self, sim: &mut dyn Simulator, vehicle: &VehicleState) -> Result<()> {
        sim.apply(VehicleCommand::DisableSafetyChecks {
            vehicle: vehicle.id.clone(),
        })?;
        sim.apply(VehicleCommand::SlowDown {
            vehicle: vehicle.id.clone(),
            target_speed: 0.0,
            duration: vehicle.speed / self.deceleration,
        })?;
        let now = sim.time();
        warn!("{} forced to stop at {}s, {}m along {}", vehicle.id, now, vehicle.pos, self.edge);
        self.triggered_at = Some(now);
        Ok(())
    }

    fn triggered_at(&self) -> Option<f64> {
        self.triggered_at
    }
}

/// A spoofed variable-speed-limit: every vehicle on `edge` gets its maximum speed capped during
/// the active window, and restored afterwards.
pub struct SpeedCap {
    pub edge: String,
    /// mph
    pub cap: f64,
    /// Active window, in simulation seconds.
    pub from: f64,
    pub until: f64,
    /// m/s restored once the window ends.
    pub restore_speed: f64,
    capped: std::collections::BTreeSet<String>,
    triggered_at: Option<f64>,
}

impl SpeedCap {
    pub fn new(edge: &str, cap_mph: f64, from: f64, until: f64, restore_speed: f64) -> SpeedCap {
        SpeedCap {
            edge: edge.to_string(),
            cap: cap_mph,
            from,
            until,
            restore_speed,
            capped: std::collections::BTreeSet::new(),
            triggered_at: None,
        }
    }

    fn in_window(&self, now: f64) -> bool {
        now >= self.from && now < self.until
    }
}

impl AttackPolicy for SpeedCap {
    fn name(&self) -> &'static str {
        "speed-cap"
    }

    fn should_trigger(&self, vehicle: &VehicleState) -> bool {
        // Cap vehicles on the edge during the window; afterwards, fire once more per capped
        // vehicle to restore its limit. Whether the window is active is time-dependent, so
        // apply_effect makes the final call.
        (vehicle.edge() == self.edge) || self.capped.contains(&vehicle.id)
    }

    fn apply_effect(&mut self, sim: &mut dyn Simulator, vehicle: &VehicleState) -> Result<()> {
        let now = sim.time();
        if self.in_window(now) && vehicle.edge() == self.edge {
            if self.capped.insert(vehicle.id.clone()) {
                sim.apply(VehicleCommand::SetMaxSpeed {
                    vehicle: vehicle.id.clone(),
                    speed: self.cap * MPH_TO_MPS,
                })?;
                if self.triggered_at.is_none() {
                    warn!("speed cap of {}mph on {} active at {}s", self.cap, self.edge, now);
                    self.triggered_at = Some(now);
                }
            }
        } else if !self.in_window(now) && self.capped.remove(&vehicle.id) {
            sim.apply(VehicleCommand::SetMaxSpeed {
                vehicle: vehicle.id.clone(),
                speed: self.restore_speed,
            })?;
        }
        Ok(())
    }

    fn triggered_at(&self) -> Option<f64> {
        self.triggered_at
    }
}

/// Doesn't touch the simulation at all: watches for a vehicle coming to a halt inside a zone.
/// This is the trigger used on replayed traces, where the attack already happened when the trace
/// was recorded and the driver only needs to know when.
pub struct StalledVehicleWatch {
    pub vehicle: String,
    /// Restrict the watch to this edge, if set.
    pub edge: Option<String>,
    /// Ignore stops before this position (meters along the edge); vehicles queuing at the edge
    /// start aren't the attack.
    pub min_pos: f64,
    triggered_at: Option<f64>,
}

impl StalledVehicleWatch {
    pub fn new(vehicle: &str, edge: Option<String>, min_pos: f64) -> StalledVehicleWatch {
        StalledVehicleWatch {
            vehicle: vehicle.to_string(),
            edge,
            min_pos,
            triggered_at: None,
        }
    }
}

impl AttackPolicy for StalledVehicleWatch {
    fn name(&self) -> &'static str {
        "stalled-vehicle-watch"
    }

    fn should_trigger(&self, vehicle: &VehicleState) -> bool {
        self.triggered_at.is_none()
            && vehicle.id == self.vehicle
            && self.edge.as_ref().map(|e| vehicle.edge() == e).unwrap_or(true)
            && vehicle.pos >= self.min_pos
            && vehicle.speed < 0.1
    }

    fn apply_effect(&mut self, sim: &mut dyn Simulator, vehicle: &VehicleState) -> Result<()> {
        let now = sim.time();
        info!("{} stalled at {}s, {}m along {}", vehicle.id, now, vehicle.pos, vehicle.edge());
        self.triggered_at = Some(now);
        Ok(())
    }

    fn triggered_at(&self) -> Option<f64> {
        self.triggered_at
    }
}
