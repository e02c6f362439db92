//! Maps aggregate flow and speed to the standard congestion measures: volume/capacity ratio,
//! Level-of-Service band, and Speed Performance Index. Pure functions, no state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The Highway Capacity Manual letter grade for congestion, A (free flow) through F (breakdown).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LevelOfService {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl fmt::Display for LevelOfService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Flow normalized by the capacity of all lanes at the cross-section. A non-positive capacity
/// yields infinity, which classifies as F; a misconfigured capacity shouldn't masquerade as free
/// flow.
pub fn v_c_ratio(flow_rate: f64, capacity_per_lane: f64, lane_count: usize) -> f64 {
    let capacity = capacity_per_lane * (lane_count as f64);
    if capacity <= 0.0 {
        return f64::INFINITY;
    }
    flow_rate / capacity
}

/// Half-open bands, first match wins. Anything outside [0, 1) -- including a negative ratio --
/// is F.
pub fn level_of_service(v_c_ratio: f64) -> LevelOfService {
    if (0.0..=0.6).contains(&v_c_ratio) {
        LevelOfService::A
    } else if v_c_ratio > 0.6 && v_c_ratio <= 0.7 {
        LevelOfService::B
    } else if v_c_ratio > 0.7 && v_c_ratio <= 0.8 {
        LevelOfService::C
    } else if v_c_ratio > 0.8 && v_c_ratio <= 0.9 {
        LevelOfService::D
    } else if v_c_ratio > 0.9 && v_c_ratio < 1.0 {
        LevelOfService::E
    } else {
        LevelOfService::F
    }
}

/// Observed mean speed normalized by free-flow speed, 0 when free-flow speed isn't positive. Both
/// speeds must be in the same unit.
pub fn speed_performance_index(mean_speed: f64, free_flow_speed: f64) -> f64 {
    if free_flow_speed > 0.0 {
        mean_speed / free_flow_speed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_los_boundaries() {
        assert_eq!(level_of_service(0.0), LevelOfService::A);
        assert_eq!(level_of_service(0.6), LevelOfService::A);
        assert_eq!(level_of_service(0.60000001), LevelOfService::B);
        assert_eq!(level_of_service(0.7), LevelOfService::B);
        assert_eq!(level_of_service(0.75), LevelOfService::C);
        assert_eq!(level_of_service(0.9), LevelOfService::D);
        assert_eq!(level_of_service(0.95), LevelOfService::E);
        assert_eq!(level_of_service(1.0), LevelOfService::F);
        assert_eq!(level_of_service(1.5), LevelOfService::F);
        assert_eq!(level_of_service(-0.1), LevelOfService::F);
    }

    #[test]
    fn test_v_c_ratio() {
        assert_eq!(v_c_ratio(2200.0, 2200.0, 2), 0.5);
        assert_eq!(v_c_ratio(60.0, 0.0, 3), f64::INFINITY);
        assert_eq!(level_of_service(v_c_ratio(60.0, 0.0, 3)), LevelOfService::F);
    }

    #[test]
    fn test_spi_zero_guard() {
        assert_eq!(speed_performance_index(55.0, 70.0), 55.0 / 70.0);
        assert_eq!(speed_performance_index(55.0, 0.0), 0.0);
        assert_eq!(speed_performance_index(55.0, -1.0), 0.0);
    }
}
