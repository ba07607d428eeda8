//! Access to the sensors of a recording platform: their point cloud streams,
//! where their extrinsics live and who to tell when they change.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::error::Result;
use crate::pointcloud::PointCloudFrame;

mod directory;
pub use directory::{DirectoryPlatform, FrameDirSource};
mod memory;
pub use memory::{InMemoryPlatform, InMemorySource};

/// Timestamped point cloud stream of one sensor.
pub trait PointCloudSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame at `index`, in capture order.
    fn get(&self, index: usize) -> Result<PointCloudFrame>;

    /// Frame whose timestamp is the closest to `timestamp`.
    fn get_at_timestamp(&self, timestamp: u64) -> Result<PointCloudFrame>;
}

/// Sensors of a recording platform.
pub trait Platform {
    /// Names of every sensor.
    fn sensors(&self) -> Vec<String>;

    /// Point cloud stream of `sensor`, if it produces one.
    fn point_cloud_source(&self, sensor: &str) -> Option<&dyn PointCloudSource>;

    /// Directory holding the extrinsics files of `sensor`.
    fn extrinsics_dir(&self, sensor: &str) -> Option<PathBuf>;
}

/// Receives the sensors whose extrinsics changed, so that views depending on
/// them can be refreshed.
pub trait ExtrinsicsObserver {
    fn extrinsics_dirty(&self, sensor: &str);
}

/// Logs the notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl ExtrinsicsObserver for LogObserver {
    fn extrinsics_dirty(&self, sensor: &str) {
        debug!(sensor, "Extrinsics changed");
    }
}

impl ExtrinsicsObserver for Sender<String> {
    fn extrinsics_dirty(&self, sensor: &str) {
        if self.send(sensor.to_string()).is_err() {
            warn!(sensor, "Extrinsics observer disconnected");
        }
    }
}

/// Index of the timestamp closest to `timestamp` in the sorted `timestamps`.
/// Ties go to the earlier one.
pub(crate) fn nearest_timestamp_index(timestamps: &[u64], timestamp: u64) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }

    let upper = timestamps.partition_point(|ts| *ts < timestamp);
    if upper == 0 {
        return Some(0);
    }
    if upper == timestamps.len() {
        return Some(upper - 1);
    }

    let before = timestamp - timestamps[upper - 1];
    let after = timestamps[upper] - timestamp;
    if after < before {
        Some(upper)
    } else {
        Some(upper - 1)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;

    #[test]
    fn should_find_nearest_timestamp() {
        let timestamps = [100, 200, 300];
        assert_eq!(nearest_timestamp_index(&timestamps, 0), Some(0));
        assert_eq!(nearest_timestamp_index(&timestamps, 149), Some(0));
        assert_eq!(nearest_timestamp_index(&timestamps, 150), Some(0));
        assert_eq!(nearest_timestamp_index(&timestamps, 151), Some(1));
        assert_eq!(nearest_timestamp_index(&timestamps, 300), Some(2));
        assert_eq!(nearest_timestamp_index(&timestamps, 1000), Some(2));
        assert_eq!(nearest_timestamp_index(&[], 10), None);
    }

    #[test]
    fn should_forward_notifications() {
        let (sender, receiver) = channel();
        sender.extrinsics_dirty("lidar");
        assert_eq!(receiver.try_recv().unwrap(), "lidar");

        drop(receiver);
        sender.extrinsics_dirty("lidar");
    }
}
