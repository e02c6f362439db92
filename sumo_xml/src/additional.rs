//! Reads detector declarations out of a SUMO additional file.

use anyhow::{Context, Result};
use serde::Deserialize;

/// One `<e1Detector/>` (induction loop) entry from an additional file.
///
/// The naming convention used by the detector-placement scripts is `EDGE_LANEINDEX_POSITIONm`,
/// e.g. `E1_0_1000m` for the loop on lane 0 of edge E1, 1000m along it.
#[derive(Clone, Debug, Deserialize)]
pub struct E1Detector {
    pub id: String,
    /// The full lane id, e.g. `E1_0`.
    pub lane: String,
    /// Distance along the lane, in meters.
    pub pos: f64,
    /// The aggregation period SUMO itself uses when writing this detector's own output file. The
    /// pipeline does its own windowing, so this is informational only.
    pub period: Option<f64>,
    pub file: Option<String>,
}

#[derive(Deserialize)]
struct AdditionalFile {
    #[serde(rename = "e1Detector", default)]
    detectors: Vec<E1Detector>,
}

/// Parses all `<e1Detector/>` entries from an additional file, in file order. Other kinds of
/// entries (rerouters, variable speed signs, ...) are ignored.
pub fn load_detectors(path: &str) -> Result<Vec<E1Detector>> {
    let file = fs_err::File::open(path)?;
    let parsed: AdditionalFile = quick_xml::de::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing detectors from {}", path))?;
    if parsed.detectors.is_empty() {
        warn!("{} declares no e1Detectors", path);
    }
    Ok(parsed.detectors)
}
