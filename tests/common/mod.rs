#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dascalib::{
    io::{write_ply, FrameEntry, FrameManifest},
    persistence::write_matrix,
    PointCloud, Transform,
};
use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Floor, two walls and a box standing on the floor, sampled at random.
pub fn room_cloud(seed: u64) -> PointCloud {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut points = Vec::new();

    for _ in 0..900 {
        points.push(Vector3::new(rng.gen_range(0.0..2.0), rng.gen_range(0.0..1.5), 0.0));
    }
    for _ in 0..600 {
        points.push(Vector3::new(0.0, rng.gen_range(0.0..1.5), rng.gen_range(0.0..1.0)));
    }
    for _ in 0..700 {
        points.push(Vector3::new(rng.gen_range(0.0..2.0), 0.0, rng.gen_range(0.0..1.0)));
    }
    // Top and two faces of a 0.3 x 0.2 x 0.25 box.
    for _ in 0..200 {
        points.push(Vector3::new(
            rng.gen_range(1.0..1.3),
            rng.gen_range(0.8..1.0),
            0.25,
        ));
        points.push(Vector3::new(1.0, rng.gen_range(0.8..1.0), rng.gen_range(0.0..0.25)));
        points.push(Vector3::new(rng.gen_range(1.0..1.3), 0.8, rng.gen_range(0.0..0.25)));
    }

    PointCloud::from_points(&points)
}

/// `lidar_front -> lidar_top` extrinsics used to build the destination clouds.
pub fn ground_truth() -> Transform {
    Transform::new(
        &Vector3::new(-0.3, 0.2, 0.15),
        &UnitQuaternion::from_euler_angles(0.02, 0.04, -0.25),
    )
}

/// Small offset from the ground truth, like an outdated calibration.
pub fn calibration_error() -> Transform {
    Transform::new(
        &Vector3::new(0.02, 0.03, -0.01),
        &UnitQuaternion::from_euler_angles(-0.01, 0.005, 0.012),
    )
}

fn write_frames(dir: &Path, clouds: &[(u64, PointCloud)]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut manifest = FrameManifest::default();
    for (i, (timestamp, cloud)) in clouds.iter().enumerate() {
        let file = PathBuf::from(format!("{i:06}.ply"));
        write_ply(dir.join(&file), cloud).unwrap();
        manifest.frames.push(FrameEntry {
            timestamp: *timestamp,
            file,
        });
    }
    manifest.save(dir).unwrap();
}

/// Writes a platform with two lidars (3 frames each) and a camera under
/// `root`. Only `lidar_front-lidar_top.bin` is stored, off by
/// [`calibration_error`].
///
/// # Returns
///
/// The path of the platform configuration file.
pub fn write_platform(root: &Path) -> PathBuf {
    let front: Vec<(u64, PointCloud)> = (0..3).map(|i| (i * 100_000, room_cloud(i))).collect();
    let top: Vec<(u64, PointCloud)> = (0..3)
        .map(|i| (i * 100_000 + 20, &ground_truth() * &room_cloud(i)))
        .collect();
    write_frames(&root.join("data/lidar_front"), &front);
    write_frames(&root.join("data/lidar_top"), &top);

    let calib_dir = root.join("calib/lidar_front");
    std::fs::create_dir_all(&calib_dir).unwrap();
    write_matrix(
        calib_dir.join("lidar_front-lidar_top.bin"),
        &(&calibration_error() * &ground_truth()),
    )
    .unwrap();

    let config_path = root.join("platform.json");
    std::fs::write(
        &config_path,
        r#"{
            "sensors": {
                "lidar_front": {"extrinsics": "calib/lidar_front", "point_cloud": "data/lidar_front"},
                "lidar_top": {"extrinsics": "calib/lidar_top", "point_cloud": "data/lidar_top"},
                "camera": {"extrinsics": "calib/camera"}
            }
        }"#,
    )
    .unwrap();
    config_path
}
