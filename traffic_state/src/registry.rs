//! Groups point detectors into road cross-sections.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DetectorId(pub String);

/// One measurement point across all lanes of an edge. Detectors named `EDGE_LANE_POSITIONm` that
/// share an edge and position but differ by lane index collapse into the cross-section
/// `EDGE_POSITIONm`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CrossSectionId(pub String);

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CrossSectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mapping from detectors to cross-sections, built once at startup and immutable afterwards.
pub struct Registry {
    cross_section_per_detector: BTreeMap<DetectorId, CrossSectionId>,
    lane_counts: BTreeMap<CrossSectionId, usize>,
}

impl Registry {
    /// Groups detector ids into cross-sections. Ids that don't follow the
    /// `EDGE_LANE_POSITIONm` convention become their own single-lane cross-section; nothing here
    /// ever fails.
    pub fn new(ids: Vec<DetectorId>) -> Registry {
        let mut cross_section_per_detector = BTreeMap::new();
        let mut lane_counts: BTreeMap<CrossSectionId, usize> = BTreeMap::new();
        for id in ids {
            let parts: Vec<&str> = id.0.split('_').collect();
            let cs = if parts.len() == 3 {
                // E1_0_1000m -> E1_1000m
                CrossSectionId(format!("{}_{}", parts[0], parts[2]))
            } else {
                CrossSectionId(id.0.clone())
            };
            *lane_counts.entry(cs.clone()).or_insert(0) += 1;
            cross_section_per_detector.insert(id, cs);
        }
        Registry {
            cross_section_per_detector,
            lane_counts,
        }
    }

    pub fn cross_section(&self, detector: &DetectorId) -> Option<&CrossSectionId> {
        self.cross_section_per_detector.get(detector)
    }

    /// How many detectors (so, lanes) make up this cross-section.
    pub fn lane_count(&self, cs: &CrossSectionId) -> usize {
        self.lane_counts.get(cs).cloned().unwrap_or(0)
    }

    pub fn detector_ids(&self) -> impl Iterator<Item = &DetectorId> {
        self.cross_section_per_detector.keys()
    }

    pub fn len(&self) -> usize {
        self.cross_section_per_detector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cross_section_per_detector.is_empty()
    }
}
