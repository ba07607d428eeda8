use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rstest::fixture;

use crate::pointcloud::PointCloud;

/// `n x n` grid on the plane `z = height`, centered at the z axis.
pub fn plane_grid(n: usize, spacing: f64, height: f64) -> PointCloud {
    let offset = (n as f64 - 1.0) * spacing * 0.5;
    let points: Vec<Vector3<f64>> = (0..n)
        .flat_map(|i| {
            (0..n).map(move |j| {
                Vector3::new(i as f64 * spacing - offset, j as f64 * spacing - offset, height)
            })
        })
        .collect();
    PointCloud::from_points(&points)
}

/// Room corner (floor and two walls of different sizes) with a ball in it.
/// Constrains all six degrees of freedom.
pub fn corner_cloud(seed: u64) -> PointCloud {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(2200);

    for _ in 0..800 {
        points.push(Vector3::new(
            rng.gen_range(0.0..1.2),
            rng.gen_range(0.0..0.8),
            0.0,
        ));
    }
    for _ in 0..500 {
        points.push(Vector3::new(
            0.0,
            rng.gen_range(0.0..0.8),
            rng.gen_range(0.0..0.6),
        ));
    }
    for _ in 0..600 {
        points.push(Vector3::new(
            rng.gen_range(0.0..1.2),
            0.0,
            rng.gen_range(0.0..0.6),
        ));
    }

    let center = Vector3::new(0.7, 0.45, 0.3);
    for _ in 0..300 {
        let direction = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if direction.norm() > 1e-3 {
            points.push(center + direction.normalize() * 0.15);
        }
    }

    PointCloud::from_points(&points)
}

#[fixture]
pub fn sample_corner_cloud() -> PointCloud {
    corner_cloud(42)
}
