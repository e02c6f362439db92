//! Drives a recorded SUMO run through the detector aggregation pipeline: replay the trace, watch
//! for the attack taking hold, feed detector occupancy to the accumulator, and persist the
//! detector and cross-section tables.

#[macro_use]
extern crate log;

pub mod attack;
pub mod driver;
pub mod logger;
pub mod output;
pub mod replay;
pub mod sim;
