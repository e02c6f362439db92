//! Merges the per-detector interval records of a cross-section into one aggregate record per
//! window.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::accumulate::IntervalRecord;
use crate::classify::{self, LevelOfService};
use crate::registry::{CrossSectionId, Registry};
use crate::{EngineConfig, SpeedCombination};

/// The aggregate of all of one cross-section's detectors over one window, classified.
#[derive(Clone, Debug, Serialize)]
pub struct CrossSectionRecord {
    pub cross_section: CrossSectionId,
    pub window_start: f64,
    pub total_vehicles: usize,
    /// mph, combined per the configured [`SpeedCombination`].
    pub mean_speed: f64,
    /// veh/h across all lanes.
    pub flow_rate: f64,
    pub lane_count: usize,
    pub v_c_ratio: f64,
    pub los: LevelOfService,
    pub spi: f64,
}

struct Group {
    window_start: f64,
    total_vehicles: usize,
    /// (mean_speed, vehicle_count) per contributing detector.
    detector_speeds: Vec<(f64, usize)>,
    lane_count: usize,
}

/// Groups interval records by `(window, cross-section)` and aggregates each group. Pure; the
/// input order doesn't matter, and the output is sorted by window, then cross-section. Records
/// for detectors the registry doesn't know are skipped with a warning.
pub fn combine(
    records: &[IntervalRecord],
    registry: &Registry,
    cfg: &EngineConfig,
) -> Vec<CrossSectionRecord> {
    let mut groups: BTreeMap<(u64, CrossSectionId), Group> = BTreeMap::new();
    for record in records {
        let cs = match registry.cross_section(&record.detector) {
            Some(cs) => cs,
            None => {
                warn!(
                    "interval record for unknown detector {}; skipping",
                    record.detector
                );
                continue;
            }
        };
        // All window starts are collection_start + k * interval, so identical windows have
        // bit-identical times. Times are non-negative, so the bit pattern sorts correctly.
        let group = groups
            .entry((record.window_start.to_bits(), cs.clone()))
            .or_insert_with(|| Group {
                window_start: record.window_start,
                total_vehicles: 0,
                detector_speeds: Vec::new(),
                lane_count: registry.lane_count(cs),
            });
        group.total_vehicles += record.vehicle_count;
        group
            .detector_speeds
            .push((record.mean_speed, record.vehicle_count));
    }

    groups
        .into_iter()
        .map(|((_, cross_section), group)| {
            let mean_speed = match cfg.speed_combination {
                SpeedCombination::VehicleWeighted => {
                    if group.total_vehicles == 0 {
                        0.0
                    } else {
                        group
                            .detector_speeds
                            .iter()
                            .map(|(speed, count)| speed * (*count as f64))
                            .sum::<f64>()
                            / (group.total_vehicles as f64)
                    }
                }
                SpeedCombination::SimpleMean => {
                    group
                        .detector_speeds
                        .iter()
                        .map(|(speed, _)| speed)
                        .sum::<f64>()
                        / (group.detector_speeds.len() as f64)
                }
            };
            let flow_rate = (group.total_vehicles as f64) * 3600.0 / cfg.interval;
            let v_c_ratio =
                classify::v_c_ratio(flow_rate, cfg.road_capacity_per_lane, group.lane_count);
            CrossSectionRecord {
                cross_section,
                window_start: group.window_start,
                total_vehicles: group.total_vehicles,
                mean_speed,
                flow_rate,
                lane_count: group.lane_count,
                v_c_ratio,
                los: classify::level_of_service(v_c_ratio),
                spi: classify::speed_performance_index(mean_speed, cfg.free_flow_speed),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DetectorId;

    fn det(x: &str) -> DetectorId {
        DetectorId(x.to_string())
    }

    fn record(detector: &str, window_start: f64, count: usize, mean_speed: f64) -> IntervalRecord {
        IntervalRecord {
            detector: det(detector),
            window_start,
            vehicle_count: count,
            flow_rate: (count as f64) * 3600.0 / 300.0,
            mean_speed,
        }
    }

    #[test]
    fn test_single_detector_idempotence() {
        let registry = Registry::new(vec![det("ramp-detector")]);
        let records = vec![record("ramp-detector", 0.0, 7, 31.5)];
        let combined = combine(&records, &registry, &EngineConfig::default());
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].total_vehicles, 7);
        assert_eq!(combined[0].flow_rate, records[0].flow_rate);
        assert_eq!(combined[0].mean_speed, 31.5);
        assert_eq!(combined[0].lane_count, 1);
    }

    #[test]
    fn test_two_lane_weighted_combination() {
        let registry = Registry::new(vec![det("E1_0_100m"), det("E1_1_100m")]);
        let records = vec![
            record("E1_0_100m", 0.0, 10, 25.0),
            record("E1_1_100m", 0.0, 14, 27.0),
        ];
        let combined = combine(&records, &registry, &EngineConfig::default());
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].cross_section, CrossSectionId("E1_100m".to_string()));
        assert_eq!(combined[0].total_vehicles, 24);
        assert_eq!(combined[0].flow_rate, 288.0);
        assert_eq!(combined[0].lane_count, 2);
        let weighted = (10.0 * 25.0 + 14.0 * 27.0) / 24.0;
        assert!((combined[0].mean_speed - weighted).abs() < 1e-9);
        // LOS uses the capacity of both lanes
        assert_eq!(combined[0].v_c_ratio, 288.0 / (2200.0 * 2.0));
        assert_eq!(combined[0].los, LevelOfService::A);
    }

    #[test]
    fn test_simple_mean_combination() {
        let registry = Registry::new(vec![det("E1_0_100m"), det("E1_1_100m")]);
        let records = vec![
            record("E1_0_100m", 0.0, 10, 25.0),
            record("E1_1_100m", 0.0, 14, 27.0),
        ];
        let cfg = EngineConfig {
            speed_combination: SpeedCombination::SimpleMean,
            ..EngineConfig::default()
        };
        let combined = combine(&records, &registry, &cfg);
        assert_eq!(combined[0].mean_speed, 26.0);
    }

    #[test]
    fn test_zero_vehicles_weighted_guard() {
        let registry = Registry::new(vec![det("E1_0_100m"), det("E1_1_100m")]);
        let records = vec![
            record("E1_0_100m", 0.0, 0, 0.0),
            record("E1_1_100m", 0.0, 0, 0.0),
        ];
        let combined = combine(&records, &registry, &EngineConfig::default());
        assert_eq!(combined[0].mean_speed, 0.0);
        assert_eq!(combined[0].flow_rate, 0.0);
    }

    #[test]
    fn test_windows_stay_separate() {
        let registry = Registry::new(vec![det("E1_0_100m"), det("E1_1_100m")]);
        let records = vec![
            record("E1_0_100m", 0.0, 3, 60.0),
            record("E1_0_100m", 300.0, 4, 55.0),
            record("E1_1_100m", 0.0, 5, 62.0),
            record("E1_1_100m", 300.0, 6, 50.0),
        ];
        let combined = combine(&records, &registry, &EngineConfig::default());
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].window_start, 0.0);
        assert_eq!(combined[0].total_vehicles, 8);
        assert_eq!(combined[1].window_start, 300.0);
        assert_eq!(combined[1].total_vehicles, 10);
    }
}
