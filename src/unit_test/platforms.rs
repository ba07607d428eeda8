use nalgebra::{UnitQuaternion, Vector3};
use rstest::fixture;

use super::corner_cloud;
use crate::{
    calibration::{CalibrationSession, ExtrinsicsGraph},
    platform::{InMemoryPlatform, InMemorySource},
    pointcloud::PointCloudFrame,
    transform::Transform,
};

/// Two lidars seeing the same room corner, and a camera without point clouds
/// nor extrinsics.
pub struct SamplePlatform {
    pub platform: InMemoryPlatform,
    /// Stored extrinsics, slightly off from the ground truth.
    pub extrinsics: ExtrinsicsGraph,
    /// `lidar_front -> lidar_top` extrinsics the point clouds were made with.
    pub ground_truth: Transform,
}

impl SamplePlatform {
    pub fn session(self) -> CalibrationSession<InMemoryPlatform> {
        CalibrationSession::new(self.platform, self.extrinsics)
    }
}

#[fixture]
pub fn sample_platform() -> SamplePlatform {
    let ground_truth = Transform::new(
        &Vector3::new(0.4, -0.1, 0.3),
        &UnitQuaternion::from_euler_angles(0.05, -0.02, 0.3),
    );
    let error = Transform::new(
        &Vector3::new(0.03, -0.02, 0.01),
        &UnitQuaternion::from_euler_angles(0.01, 0.0, -0.015),
    );

    let front: InMemorySource = (0..3)
        .map(|i| PointCloudFrame::new(i * 100, corner_cloud(i)))
        .collect();
    let top: InMemorySource = (0..3)
        .map(|i| PointCloudFrame::new(i * 100 + 5, &ground_truth * &corner_cloud(i)))
        .collect();

    let mut extrinsics = ExtrinsicsGraph::new();
    extrinsics
        .update("lidar_front", "lidar_top", &(&error * &ground_truth))
        .unwrap();

    SamplePlatform {
        platform: InMemoryPlatform::new()
            .with_sensor("lidar_front", Some(front), None)
            .with_sensor("lidar_top", Some(top), None)
            .with_sensor("camera", None, None),
        extrinsics,
        ground_truth,
    }
}
