mod common;

use approx::assert_abs_diff_eq;
use dascalib::{
    icp::{register, Icp, IcpMode, IcpParams},
    metrics::TransformMetrics,
    Error, PointCloud, Transform,
};
use nalgebra::{UnitQuaternion, Vector3};

use common::{ground_truth, room_cloud};

fn offset() -> Transform {
    Transform::new(
        &Vector3::new(0.04, -0.02, 0.03),
        &UnitQuaternion::from_euler_angles(0.015, -0.01, 0.02),
    )
}

#[test]
fn should_align_with_given_normals() {
    let source = room_cloud(7);
    let mut target = &ground_truth() * &source;
    target.compute_normals(12);

    let mut icp = Icp::new(
        IcpParams::default()
            .mode(IcpMode::Plane)
            .max_iterations(50)
            .clone(),
        &target,
    );
    icp.initial_transform = &offset() * &ground_truth();
    let result = icp.align(&source).unwrap();

    let metrics = TransformMetrics::new(&result.transform, &ground_truth());
    assert!(metrics.angle < 1e-6, "{metrics}");
    assert!(metrics.translation < 1e-6, "{metrics}");
    assert!(result.inlier_rmse < 1e-6);
}

#[test]
fn should_register_many_sources_on_one_target() {
    let target = &ground_truth() * &room_cloud(8);
    let mut icp = Icp::new(IcpParams::default().max_iterations(100).clone(), &target);
    icp.initial_transform = ground_truth();

    for moved in [offset(), offset().inverse()] {
        // Points of the source are `moved` away from the ones the target was made with.
        let source = &moved.inverse() * &room_cloud(8);
        let result = icp.align(&source).unwrap();
        assert_abs_diff_eq!(result.transform, &ground_truth() * &moved, epsilon = 1e-6);
        assert_eq!(result.correspondences, source.len());
    }
}

#[test]
fn should_stop_at_max_iterations() {
    let source = room_cloud(9);
    let target = &offset() * &source;
    let result = register(
        &source,
        &target,
        &Transform::eye(),
        IcpParams::default().max_iterations(1),
    )
    .unwrap();

    assert_eq!(result.iterations, 1);
    assert!(!result.converged);
}

#[test]
fn should_reject_degenerate_input() {
    let source = room_cloud(9);
    let params = IcpParams::default().max_correspondence_distance(0.0).clone();
    assert!(matches!(
        register(&source, &source, &Transform::eye(), &params),
        Err(Error::InvalidParameter(_))
    ));

    let two_points = PointCloud::from_points(&[Vector3::zeros(), Vector3::x()]);
    assert!(matches!(
        register(&two_points, &source, &Transform::eye(), &IcpParams::default()),
        Err(Error::InsufficientData(_))
    ));

    // A single plane leaves three degrees of freedom unconstrained.
    let floor = PointCloud::from_points(
        &(0..100)
            .map(|i| Vector3::new((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, 0.0))
            .collect::<Vec<_>>(),
    );
    let params = IcpParams::default().mode(IcpMode::Plane).clone();
    assert!(matches!(
        register(&floor, &floor, &Transform::eye(), &params),
        Err(Error::InsufficientData(_))
    ));
}
