use criterion::{criterion_group, criterion_main, Criterion};
use dascalib::icp::{Icp, IcpMode, IcpParams};
use dascalib::pointcloud::PointCloud;
use dascalib::transform::Transform;
use nalgebra::{UnitQuaternion, Vector3};
use pprof::criterion::{Output, PProfProfiler};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Floor and two walls sampled at random.
fn room_corner(num_points: usize) -> PointCloud {
    let mut rng = SmallRng::seed_from_u64(3);
    let points: Vec<Vector3<f64>> = (0..num_points)
        .map(|i| {
            let (u, v) = (rng.gen_range(0.0..8.0), rng.gen_range(0.0..3.0));
            match i % 3 {
                0 => Vector3::new(u, v * 2.0, 0.0),
                1 => Vector3::new(0.0, u * 0.75, v),
                _ => Vector3::new(u, 0.0, v),
            }
        })
        .collect();
    PointCloud::from_points(&points)
}

fn icp_benchmark(c: &mut Criterion) {
    let source = room_corner(50000);
    let target = &Transform::new(
        &Vector3::new(0.1, -0.05, 0.02),
        &UnitQuaternion::from_euler_angles(0.01, 0.02, -0.03),
    ) * &source;

    for mode in [IcpMode::Point, IcpMode::Plane] {
        let icp = Icp::new(
            IcpParams::default()
                .mode(mode)
                .max_iterations(10)
                .clone(),
            &target,
        );

        c.bench_function(&format!("icp {mode:?} align"), |b| {
            b.iter(|| icp.align(&source).unwrap());
        });
    }

    c.bench_function("normal estimation", |b| {
        b.iter(|| target.estimate_normals(10));
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = icp_benchmark
}

criterion_main!(benches);
