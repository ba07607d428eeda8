use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{nearest_timestamp_index, Platform, PointCloudSource};
use crate::error::{Error, Result};
use crate::pointcloud::PointCloudFrame;

/// Point cloud stream held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    frames: Vec<PointCloudFrame>,
}

impl InMemorySource {
    /// Creates the stream, the frames are sorted by timestamp.
    pub fn new(mut frames: Vec<PointCloudFrame>) -> Self {
        frames.sort_by_key(|frame| frame.timestamp);
        Self { frames }
    }

    fn timestamps(&self) -> Vec<u64> {
        self.frames.iter().map(|frame| frame.timestamp).collect()
    }
}

impl FromIterator<PointCloudFrame> for InMemorySource {
    fn from_iter<T: IntoIterator<Item = PointCloudFrame>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl PointCloudSource for InMemorySource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn get(&self, index: usize) -> Result<PointCloudFrame> {
        self.frames.get(index).cloned().ok_or_else(|| {
            Error::invalid_parameter(format!(
                "frame {index} out of range, the source has {} frames",
                self.frames.len()
            ))
        })
    }

    fn get_at_timestamp(&self, timestamp: u64) -> Result<PointCloudFrame> {
        let index = nearest_timestamp_index(&self.timestamps(), timestamp)
            .ok_or_else(|| Error::insufficient_data("point cloud source has no frames"))?;
        self.get(index)
    }
}

#[derive(Clone, Debug, Default)]
struct SensorEntry {
    source: Option<InMemorySource>,
    extrinsics_dir: Option<PathBuf>,
}

/// Platform whose sensors are registered by hand. Useful for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPlatform {
    sensors: BTreeMap<String, SensorEntry>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a sensor.
    pub fn with_sensor(
        mut self,
        name: &str,
        source: Option<InMemorySource>,
        extrinsics_dir: Option<PathBuf>,
    ) -> Self {
        self.sensors.insert(
            name.to_string(),
            SensorEntry {
                source,
                extrinsics_dir,
            },
        );
        self
    }
}

impl Platform for InMemoryPlatform {
    fn sensors(&self) -> Vec<String> {
        self.sensors.keys().cloned().collect()
    }

    fn point_cloud_source(&self, sensor: &str) -> Option<&dyn PointCloudSource> {
        self.sensors
            .get(sensor)?
            .source
            .as_ref()
            .map(|source| source as &dyn PointCloudSource)
    }

    fn extrinsics_dir(&self, sensor: &str) -> Option<PathBuf> {
        self.sensors.get(sensor)?.extrinsics_dir.clone()
    }
}
