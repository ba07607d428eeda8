//! Extrinsic calibration refinement: the sensor pair graph, the multi frame
//! batch refinement and the editing session tying them to a platform.

mod batch;
pub use batch::{refine_batch, BatchProgress, BatchResult, CancelToken};
mod graph;
pub use graph::ExtrinsicsGraph;
mod session;
pub use session::CalibrationSession;

use serde_derive::{Deserialize, Serialize};

/// How a computed pose is applied to the stored extrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibMode {
    /// The pose is a correction composed on top of the snapshot: `snapshot * pose`.
    #[default]
    Relative,
    /// The pose replaces the extrinsics.
    Absolute,
}

/// Ordered (source, destination) sensor pair. Its extrinsics map points of
/// the source sensor frame into the destination sensor frame.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorPair {
    pub source: String,
    pub destination: String,
}

impl SensorPair {
    pub fn new(source: &str, destination: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    /// The same sensors in the other direction.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.destination.clone(),
            destination: self.source.clone(),
        }
    }
}

impl std::fmt::Display for SensorPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.source, self.destination)
    }
}
