//! Reads a floating-car-data export, the per-timestep snapshot of every vehicle in a run. Produce
//! one with `sumo -c scenario.sumocfg --fcd-output trace.xml`.

use anyhow::{Context, Result};
use serde::Deserialize;

/// A full FCD trace, timesteps in file order.
pub struct FcdTrace {
    pub timesteps: Vec<Timestep>,
}

#[derive(Deserialize)]
pub struct Timestep {
    /// Simulation time in seconds.
    pub time: f64,
    #[serde(rename = "vehicle", default)]
    pub vehicles: Vec<VehicleSnapshot>,
}

/// One vehicle's state at one timestep.
#[derive(Clone, Debug, Deserialize)]
pub struct VehicleSnapshot {
    pub id: String,
    /// m/s
    pub speed: f64,
    /// Distance along the lane, in meters.
    pub pos: f64,
    /// Empty while a vehicle is teleporting; the loader drops those snapshots.
    #[serde(default)]
    pub lane: String,
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
}

#[derive(Deserialize)]
struct FcdExport {
    #[serde(rename = "timestep", default)]
    timesteps: Vec<Timestep>,
}

impl FcdTrace {
    pub fn load(path: &str) -> Result<FcdTrace> {
        let file = fs_err::File::open(path)?;
        let parsed: FcdExport = quick_xml::de::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("parsing FCD trace from {}", path))?;
        Ok(FcdTrace::from_raw(parsed, path))
    }

    fn from_raw(raw: FcdExport, path: &str) -> FcdTrace {
        let mut laneless = 0;
        let mut timesteps = raw.timesteps;
        for step in &mut timesteps {
            step.vehicles.retain(|v| {
                if v.lane.is_empty() {
                    laneless += 1;
                }
                !v.lane.is_empty()
            });
        }
        if laneless > 0 {
            warn!(
                "{}: dropped {} laneless (teleporting) vehicle snapshots",
                path, laneless
            );
        }
        if timesteps.is_empty() {
            warn!("{} contains no timesteps", path);
        }
        FcdTrace { timesteps }
    }
}
