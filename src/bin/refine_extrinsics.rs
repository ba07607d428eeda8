use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use dascalib::{
    calibration::CancelToken,
    icp::{IcpMode, IcpParams},
    metrics::TransformMetrics,
    platform::{DirectoryPlatform, Platform, PointCloudSource},
    CalibrationSession, Pose,
};
use kdam::{tqdm, BarExt};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

#[derive(Parser)]
#[clap(about = "Refines the extrinsics between two point cloud sensors with ICP")]
struct Args {
    /// Platform configuration file (JSON)
    config: PathBuf,
    /// Sensor whose point clouds are moved
    source: String,
    /// Sensor whose point clouds are matched against
    destination: String,
    /// Source frame to register
    #[clap(long, conflicts_with = "all")]
    frame: Option<usize>,
    /// Registers every source frame and averages the results
    #[clap(long, action)]
    all: bool,
    /// Maximum distance between corresponding points, in meters
    #[clap(long, default_value_t = 0.5)]
    max_distance: f64,
    /// ICP error metric: point or plane
    #[clap(long, default_value = "point")]
    mode: IcpMode,
    #[clap(long, default_value_t = 30)]
    max_iterations: usize,
    /// Replaces the extrinsics with the refinement
    #[clap(long, action)]
    apply: bool,
    /// Writes the extrinsics to disk, backing up the previous files
    #[clap(long, action, requires = "apply")]
    save: bool,
}

fn init_logging() -> anyhow::Result<()> {
    let collector = tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(!cfg!(windows)))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing::subscriber::set_global_default(collector)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();

    let platform = DirectoryPlatform::load(&args.config)
        .with_context(|| format!("loading platform {:?}", args.config))?;
    let mut session = CalibrationSession::load(platform)?;

    let initial_guess = session
        .working()
        .get(&args.source, &args.destination)
        .cloned()
        .with_context(|| {
            format!(
                "no extrinsics between {} and {}, known sources: {:?}",
                args.source,
                args.destination,
                session.sources()
            )
        })?;

    let params = IcpParams::default()
        .max_correspondence_distance(args.max_distance)
        .mode(args.mode)
        .max_iterations(args.max_iterations)
        .clone();

    let refined = if args.all {
        let total = session
            .platform()
            .point_cloud_source(&args.source)
            .map_or(0, |source| source.len());
        let mut pb = tqdm!(total = total, desc = "Registering frames");
        let result = session.refine_all_frames(
            &args.source,
            &args.destination,
            &params,
            |_| {
                if let Err(err) = pb.update(1) {
                    warn!("Could not draw the progress bar: {err}");
                }
            },
            &CancelToken::new(),
        )?;
        println!(
            "Averaged {} frames ({} failed)",
            result.frames_used, result.frames_failed
        );
        result.transform
    } else {
        let frame = args.frame.unwrap_or(0);
        let result =
            session.refine_one_frame(&args.source, &args.destination, frame, &params)?;
        println!(
            "Frame {frame}: fitness {:.4}, rmse {:.4}, {} iterations{}",
            result.fitness,
            result.inlier_rmse,
            result.iterations,
            if result.converged { "" } else { " (not converged)" }
        );
        result.transform
    };

    println!("Refined pose: {}", Pose::from(&refined));
    println!(
        "Change from the stored extrinsics: {}",
        TransformMetrics::new(&initial_guess, &refined)
    );
    println!("{refined}");

    if args.apply {
        let pose = session.apply_refinement()?;
        println!("Applied {pose}");
    }

    if args.save {
        let report = session.save_all();
        for path in &report.saved {
            println!("Saved {}", path.display());
        }
        if !report.is_complete() {
            for (pair, err) in &report.failures {
                eprintln!("Failed to save {pair}: {err}");
            }
            bail!("{} extrinsics files were not saved", report.failures.len());
        }
    }

    Ok(())
}
