use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;

/// Where the data of a sensor lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Directory of the `{sensor}-{other}.bin` extrinsics files.
    pub extrinsics: PathBuf,
    /// Frame directory with a `frames.json` manifest, for sensors producing point clouds.
    #[serde(default)]
    pub point_cloud: Option<PathBuf>,
}

/// Platform description:
///
/// ```json
/// {"sensors": {"lidar_top": {"extrinsics": "calib/lidar_top", "point_cloud": "lidar_top"}}}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub sensors: BTreeMap<String, SensorConfig>,
}

impl PlatformConfig {
    /// Loads the configuration. Relative paths are resolved against the
    /// directory of the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buffer = std::io::BufReader::new(std::fs::File::open(path)?);
        let config: PlatformConfig = serde_json::from_reader(buffer)?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolved(base_dir))
    }

    /// Copy of this configuration with relative paths joined to `base_dir`.
    pub fn resolved(self, base_dir: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        };

        Self {
            sensors: self
                .sensors
                .into_iter()
                .map(|(name, sensor)| {
                    (
                        name,
                        SensorConfig {
                            extrinsics: resolve(sensor.extrinsics),
                            point_cloud: sensor.point_cloud.map(resolve),
                        },
                    )
                })
                .collect(),
        }
    }
}
