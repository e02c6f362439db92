//! Writes the two result tables. Both are append-friendly: the first run of a comparison creates
//! the file with headers, the second run's rows land underneath with the same schema, and the
//! `scenario` column tells them apart.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use traffic_state::classify::{self, LevelOfService};
use traffic_state::{CrossSectionRecord, EngineConfig, IntervalRecord};

/// One detector-interval row of `detector_results.csv`.
#[derive(Debug, PartialEq, Serialize)]
pub struct DetectorRow {
    pub time: f64,
    pub detector_id: String,
    pub mean_speed: f64,
    pub flowrate: f64,
    #[serde(rename = "LOS")]
    pub los: LevelOfService,
    #[serde(rename = "SPI")]
    pub spi: f64,
    pub time_interval: f64,
    pub interval_unique_vehicles: usize,
    pub scenario: String,
}

/// One cross-section row of `cross_section_results.csv`.
#[derive(Debug, PartialEq, Serialize)]
pub struct CrossSectionRow {
    pub time: f64,
    pub edge: String,
    pub mean_speed: f64,
    pub flowrate: f64,
    #[serde(rename = "LOS")]
    pub los: LevelOfService,
    #[serde(rename = "SPI")]
    pub spi: f64,
    pub lanes: usize,
    pub total_vehicles: usize,
    pub scenario: String,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// A single detector covers one lane, so its LOS is judged against one lane of capacity.
pub fn detector_rows(
    records: &[IntervalRecord],
    cfg: &EngineConfig,
    scenario: &str,
) -> Vec<DetectorRow> {
    records
        .iter()
        .map(|record| {
            let v_c = classify::v_c_ratio(record.flow_rate, cfg.road_capacity_per_lane, 1);
            DetectorRow {
                time: record.window_start,
                detector_id: record.detector.to_string(),
                mean_speed: round2(record.mean_speed),
                flowrate: round2(record.flow_rate),
                los: classify::level_of_service(v_c),
                spi: round2(classify::speed_performance_index(
                    record.mean_speed,
                    cfg.free_flow_speed,
                )),
                time_interval: cfg.interval,
                interval_unique_vehicles: record.vehicle_count,
                scenario: scenario.to_string(),
            }
        })
        .collect()
}

pub fn cross_section_rows(records: &[CrossSectionRecord], scenario: &str) -> Vec<CrossSectionRow> {
    records
        .iter()
        .map(|record| CrossSectionRow {
            time: record.window_start,
            edge: record.cross_section.to_string(),
            mean_speed: round2(record.mean_speed),
            flowrate: round2(record.flow_rate),
            los: record.los,
            spi: round2(record.spi),
            lanes: record.lane_count,
            total_vehicles: record.total_vehicles,
            scenario: scenario.to_string(),
        })
        .collect()
}

/// Appends rows to a CSV file, creating it with headers if it doesn't exist yet.
pub fn append_csv<S: Serialize>(path: &str, rows: &[S]) -> Result<()> {
    let exists = Path::new(path).exists();
    let file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(
        "{} {} rows to {}",
        if exists { "Appended" } else { "Wrote" },
        rows.len(),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use traffic_state::DetectorId;

    fn record(count: usize, mean_speed: f64) -> IntervalRecord {
        IntervalRecord {
            detector: DetectorId("E1_0_100m".to_string()),
            window_start: 2444.6,
            vehicle_count: count,
            flow_rate: (count as f64) * 3600.0 / 300.0,
            mean_speed,
        }
    }

    #[test]
    fn test_detector_rows() {
        let cfg = EngineConfig::default();
        let rows = detector_rows(&vec![record(12, 61.238)], &cfg, "attack");
        assert_eq!(
            rows,
            vec![DetectorRow {
                time: 2444.6,
                detector_id: "E1_0_100m".to_string(),
                mean_speed: 61.24,
                flowrate: 144.0,
                los: LevelOfService::A,
                spi: 0.87,
                time_interval: 300.0,
                interval_unique_vehicles: 12,
                scenario: "attack".to_string(),
            }]
        );
    }

    #[test]
    fn test_append_creates_then_appends() {
        let path = std::env::temp_dir().join(format!(
            "detector_results_test_{}.csv",
            std::process::id()
        ));
        let path = path.to_str().unwrap().to_string();
        let _ = std::fs::remove_file(&path);

        let cfg = EngineConfig::default();
        append_csv(&path, &detector_rows(&vec![record(5, 50.0)], &cfg, "attack")).unwrap();
        append_csv(&path, &detector_rows(&vec![record(7, 65.0)], &cfg, "base")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "time,detector_id,mean_speed,flowrate,LOS,SPI,time_interval,interval_unique_vehicles,scenario"
        );
        assert!(lines[1].ends_with("attack"));
        assert!(lines[2].ends_with("base"));
        // Only one header
        assert_eq!(contents.matches("detector_id").count(), 1);

        std::fs::remove_file(&path).unwrap();
    }
}
