use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{debug, info, warn};

use crate::{
    averaging::TransformAccumulator,
    error::{Error, Result},
    icp::{register, IcpParams},
    pointcloud::PointCloud,
    transform::Transform,
};

/// Cooperative cancellation flag shared between a batch refinement and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the cancellation. The running batch stops before its next frame,
    /// or before averaging when it was on its last one.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reported after each processed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// Frames processed so far, failed ones included.
    pub processed: usize,
    pub total: usize,
    /// Frames whose registration succeeded so far.
    pub used: usize,
}

/// Average of the per frame registrations.
#[derive(Clone, Debug)]
pub struct BatchResult {
    pub transform: Transform,
    pub frames_used: usize,
    pub frames_failed: usize,
}

/// Registers every (source, destination) frame pair starting from the same
/// initial guess and averages the results.
///
/// Frames that can't be fetched or registered are skipped.
///
/// # Arguments
///
/// * frames - Frame pairs, or the error raised while fetching them.
/// * total - Number of frames, only used for progress reporting.
/// * initial_guess - Initial transform of every registration.
/// * params - ICP parameters.
/// * progress - Called after each frame.
/// * cancel - Checked before each frame and before averaging.
///
/// # Returns
///
/// `CalibrationFailed` when no frame could be registered, `Cancelled` when
/// the token was triggered.
pub fn refine_batch<I, F>(
    frames: I,
    total: usize,
    initial_guess: &Transform,
    params: &IcpParams,
    mut progress: F,
    cancel: &CancelToken,
) -> Result<BatchResult>
where
    I: IntoIterator<Item = Result<(PointCloud, PointCloud)>>,
    F: FnMut(BatchProgress),
{
    params.validate()?;

    let mut accumulator = TransformAccumulator::new();
    let mut processed = 0;
    let mut failed = 0;

    let check_cancel = |processed: usize| {
        if cancel.is_cancelled() {
            info!(processed, total, "Batch refinement cancelled");
            return Err(Error::Cancelled { processed });
        }
        Ok(())
    };

    for frame in frames {
        check_cancel(processed)?;

        match frame.and_then(|(source, destination)| {
            register(&source, &destination, initial_guess, params)
        }) {
            Ok(result) => {
                debug!(
                    frame = processed,
                    fitness = result.fitness,
                    rmse = result.inlier_rmse,
                    iterations = result.iterations,
                    "Frame registered"
                );
                accumulator.add(&result.transform);
            }
            Err(err) => {
                warn!(frame = processed, "Skipping frame: {err}");
                failed += 1;
            }
        }

        processed += 1;
        progress(BatchProgress {
            processed,
            total,
            used: accumulator.len(),
        });
    }
    check_cancel(processed)?;

    let transform = accumulator
        .mean()
        .ok_or(Error::CalibrationFailed { frames: processed })?;

    info!(
        used = accumulator.len(),
        failed, "Batch refinement finished"
    );
    Ok(BatchResult {
        transform,
        frames_used: accumulator.len(),
        frames_failed: failed,
    })
}
