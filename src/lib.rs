//! Refinement of the extrinsic calibration between point cloud sensors.
//!
//! Registers the point clouds of a source sensor onto the ones of a
//! destination sensor with ICP, over one frame or averaged over a whole
//! recording, and edits, saves and restores the resulting extrinsics.

pub mod averaging;
pub mod calibration;
pub mod error;
pub mod icp;
pub mod io;
pub mod kdtree;
pub mod metrics;
mod optim;
pub mod persistence;
pub mod platform;
pub mod pointcloud;
pub mod pose;
pub mod transform;

#[cfg(test)]
mod unit_test;

pub use calibration::{CalibMode, CalibrationSession, ExtrinsicsGraph, SensorPair};
pub use error::{Error, Result};
pub use icp::{Icp, IcpMode, IcpParams, IcpResult};
pub use pointcloud::{PointCloud, PointCloudFrame};
pub use pose::Pose;
pub use transform::Transform;
