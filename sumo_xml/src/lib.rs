//! This crate provides a Rust interface to the parts of the
//! [SUMO](https://www.eclipse.org/sumo/) file ecosystem that the detector pipeline consumes: the
//! [additional file](https://sumo.dlr.de/docs/sumo.html#format_of_additional_files) declaring
//! induction-loop detectors, and the
//! [FCD trace](https://sumo.dlr.de/docs/Simulation/Output/FCDOutput.html) exported by a recorded
//! run.

#[macro_use]
extern crate log;

pub use self::additional::{load_detectors, E1Detector};
pub use self::fcd::{FcdTrace, Timestep, VehicleSnapshot};

mod additional;
mod fcd;
