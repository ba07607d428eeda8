use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{nearest_timestamp_index, Platform, PointCloudSource};
use crate::error::{Error, Result};
use crate::io::{read_ply, FrameManifest, PlatformConfig};
use crate::pointcloud::PointCloudFrame;

/// Point cloud stream stored as PLY files listed by a `frames.json` manifest.
/// Frames are read from disk on each access.
#[derive(Clone, Debug)]
pub struct FrameDirSource {
    base_dir: PathBuf,
    manifest: FrameManifest,
    timestamps: Vec<u64>,
}

impl FrameDirSource {
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let manifest = FrameManifest::load(&base_dir)?;
        let timestamps = manifest.timestamps();
        Ok(Self {
            base_dir,
            manifest,
            timestamps,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl PointCloudSource for FrameDirSource {
    fn len(&self) -> usize {
        self.manifest.len()
    }

    fn get(&self, index: usize) -> Result<PointCloudFrame> {
        let entry = self.manifest.frames.get(index).ok_or_else(|| {
            Error::invalid_parameter(format!(
                "frame {index} out of range, {} has {} frames",
                self.base_dir.display(),
                self.manifest.len()
            ))
        })?;
        let cloud = read_ply(self.base_dir.join(&entry.file))?;
        Ok(PointCloudFrame::new(entry.timestamp, cloud))
    }

    fn get_at_timestamp(&self, timestamp: u64) -> Result<PointCloudFrame> {
        let index = nearest_timestamp_index(&self.timestamps, timestamp).ok_or_else(|| {
            Error::insufficient_data(format!("{} has no frames", self.base_dir.display()))
        })?;
        self.get(index)
    }
}

/// Platform described by a [`PlatformConfig`] file.
#[derive(Debug)]
pub struct DirectoryPlatform {
    config: PlatformConfig,
    sources: BTreeMap<String, FrameDirSource>,
}

impl DirectoryPlatform {
    /// Loads the configuration and the frame manifests of every point cloud sensor.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        Self::new(PlatformConfig::load(config_path)?)
    }

    pub fn new(config: PlatformConfig) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for (name, sensor) in &config.sensors {
            if let Some(point_cloud_dir) = &sensor.point_cloud {
                let source = FrameDirSource::load(point_cloud_dir)?;
                info!(sensor = name.as_str(), frames = source.len(), "Loaded point cloud source");
                sources.insert(name.clone(), source);
            }
        }
        Ok(Self { config, sources })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }
}

impl Platform for DirectoryPlatform {
    fn sensors(&self) -> Vec<String> {
        self.config.sensors.keys().cloned().collect()
    }

    fn point_cloud_source(&self, sensor: &str) -> Option<&dyn PointCloudSource> {
        self.sources
            .get(sensor)
            .map(|source| source as &dyn PointCloudSource)
    }

    fn extrinsics_dir(&self, sensor: &str) -> Option<PathBuf> {
        self.config
            .sensors
            .get(sensor)
            .map(|sensor| sensor.extrinsics.clone())
    }
}
