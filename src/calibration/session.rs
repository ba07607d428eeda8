use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use super::{
    refine_batch, BatchProgress, BatchResult, CalibMode, CancelToken, ExtrinsicsGraph, SensorPair,
};
use crate::{
    error::{Error, Result},
    icp::{register, IcpParams, IcpResult},
    persistence::{load_graph, save_graph, SaveReport},
    platform::{ExtrinsicsObserver, LogObserver, Platform, PointCloudSource},
    pointcloud::PointCloud,
    pose::Pose,
    transform::Transform,
};

/// Calibration of the extrinsics of a platform.
///
/// The session keeps the extrinsics as they are on disk (`original`) and the
/// edited ones (`working`). The first time a pair is selected or edited, in
/// either direction, the working extrinsics of both directions are copied
/// into snapshots that relative corrections compose on, and that resets go
/// back to.
pub struct CalibrationSession<P: Platform> {
    platform: P,
    observer: Box<dyn ExtrinsicsObserver>,
    original: ExtrinsicsGraph,
    working: ExtrinsicsGraph,
    snapshots: HashMap<SensorPair, Transform>,
    selection: Option<SensorPair>,
    mode: CalibMode,
    pose: Pose,
    last_refinement: Option<(SensorPair, Transform)>,
}

impl<P: Platform> CalibrationSession<P> {
    /// Starts a session over the given extrinsics.
    pub fn new(platform: P, extrinsics: ExtrinsicsGraph) -> Self {
        Self {
            platform,
            observer: Box::new(LogObserver),
            original: extrinsics.clone(),
            working: extrinsics,
            snapshots: HashMap::new(),
            selection: None,
            mode: CalibMode::default(),
            pose: Pose::identity(),
            last_refinement: None,
        }
    }

    /// Starts a session over the extrinsics files of the platform.
    pub fn load(platform: P) -> Result<Self> {
        let extrinsics = load_graph(&platform)?;
        Ok(Self::new(platform, extrinsics))
    }

    /// Replaces the observer notified of extrinsics changes.
    pub fn with_observer<O: ExtrinsicsObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Extrinsics as they were last loaded or saved.
    pub fn original(&self) -> &ExtrinsicsGraph {
        &self.original
    }

    /// Extrinsics with the edits of this session.
    pub fn working(&self) -> &ExtrinsicsGraph {
        &self.working
    }

    /// Extrinsics of the pair when it, or its reverse, was first selected or edited.
    pub fn snapshot(&self, source: &str, destination: &str) -> Option<&Transform> {
        self.snapshots.get(&SensorPair::new(source, destination))
    }

    pub fn mode(&self) -> CalibMode {
        self.mode
    }

    /// Pose shown in the editor for the selected pair.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn selection(&self) -> Option<&SensorPair> {
        self.selection.as_ref()
    }

    /// Last registration result and the pair it was computed for.
    pub fn last_refinement(&self) -> Option<&(SensorPair, Transform)> {
        self.last_refinement.as_ref()
    }

    /// Sensors that have extrinsics to at least one other sensor.
    pub fn sources(&self) -> Vec<String> {
        self.working.sources()
    }

    pub fn destinations(&self, source: &str) -> Vec<String> {
        self.working.destinations(source)
    }

    fn capture_snapshot(&mut self, source: &str, destination: &str) -> Result<Transform> {
        let pair = SensorPair::new(source, destination);
        if let Some(snapshot) = self.snapshots.get(&pair) {
            return Ok(snapshot.clone());
        }

        let snapshot = self
            .working
            .get(source, destination)
            .cloned()
            .ok_or_else(|| Error::missing_sensor_path(source, destination, "no extrinsics"))?;
        // Both directions, before either of them gets edited.
        if let Some(reverse) = self.working.get(destination, source) {
            self.snapshots.insert(pair.reversed(), reverse.clone());
        }
        self.snapshots.insert(pair, snapshot.clone());
        Ok(snapshot)
    }

    /// Pose of the working extrinsics of the pair, as seen in `mode`.
    fn current_pose(&mut self, source: &str, destination: &str, mode: CalibMode) -> Result<Pose> {
        let snapshot = self.capture_snapshot(source, destination)?;
        let working = self
            .working
            .get(source, destination)
            .ok_or_else(|| Error::missing_sensor_path(source, destination, "no extrinsics"))?;
        Ok(match mode {
            CalibMode::Relative => Pose::from(&(&snapshot.inverse() * working)),
            CalibMode::Absolute => Pose::from(working),
        })
    }

    /// Selects the pair edited by [`Self::apply_pose`]. Its snapshot is taken
    /// if this is the first time.
    ///
    /// # Returns
    ///
    /// The editor pose of the pair, `MissingSensorPath` when there are no
    /// extrinsics between the sensors.
    pub fn select_pair(&mut self, source: &str, destination: &str) -> Result<Pose> {
        self.pose = self.current_pose(source, destination, self.mode)?;
        self.selection = Some(SensorPair::new(source, destination));
        Ok(self.pose)
    }

    /// Changes how poses are applied. The selected pair is reset to its snapshot.
    pub fn set_mode(&mut self, mode: CalibMode) -> Result<()> {
        self.mode = mode;
        if let Some(pair) = self.selection.clone() {
            self.reset_pose(&pair.source, &pair.destination, mode)?;
        }
        Ok(())
    }

    fn sources_of(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<(&dyn PointCloudSource, &dyn PointCloudSource, Transform)> {
        let no_point_clouds = |sensor: &str| {
            Error::missing_sensor_path(source, destination, format!("{sensor} has no point clouds"))
        };
        let source_stream = self
            .platform
            .point_cloud_source(source)
            .ok_or_else(|| no_point_clouds(source))?;
        let destination_stream = self
            .platform
            .point_cloud_source(destination)
            .ok_or_else(|| no_point_clouds(destination))?;
        let initial_guess = self
            .working
            .get(source, destination)
            .cloned()
            .ok_or_else(|| Error::missing_sensor_path(source, destination, "no extrinsics"))?;
        Ok((source_stream, destination_stream, initial_guess))
    }

    /// Registers one frame of the source sensor onto the destination frame
    /// closest in time, starting from the working extrinsics.
    pub fn refine_one_frame(
        &mut self,
        source: &str,
        destination: &str,
        frame_index: usize,
        params: &IcpParams,
    ) -> Result<IcpResult> {
        let result = {
            let (source_stream, destination_stream, initial_guess) =
                self.sources_of(source, destination)?;
            let frame = source_stream.get(frame_index)?;
            let target = destination_stream.get_at_timestamp(frame.timestamp)?;
            register(&frame.cloud, &target.cloud, &initial_guess, params)?
        };

        info!(
            source,
            destination,
            frame_index,
            fitness = result.fitness,
            rmse = result.inlier_rmse,
            "Refined extrinsics: {}",
            Pose::from(&result.transform)
        );
        self.last_refinement = Some((
            SensorPair::new(source, destination),
            result.transform.clone(),
        ));
        Ok(result)
    }

    /// Registers every frame of the source sensor as in
    /// [`Self::refine_one_frame`] and averages the results. See [`refine_batch`].
    pub fn refine_all_frames<F>(
        &mut self,
        source: &str,
        destination: &str,
        params: &IcpParams,
        progress: F,
        cancel: &CancelToken,
    ) -> Result<BatchResult>
    where
        F: FnMut(BatchProgress),
    {
        let result = {
            let (source_stream, destination_stream, initial_guess) =
                self.sources_of(source, destination)?;
            let frames = (0..source_stream.len()).map(|index| -> Result<(PointCloud, PointCloud)> {
                let frame = source_stream.get(index)?;
                let target = destination_stream.get_at_timestamp(frame.timestamp)?;
                Ok((frame.cloud, target.cloud))
            });
            refine_batch(
                frames,
                source_stream.len(),
                &initial_guess,
                params,
                progress,
                cancel,
            )?
        };

        info!(
            source,
            destination,
            frames_used = result.frames_used,
            frames_failed = result.frames_failed,
            "Refined extrinsics: {}",
            Pose::from(&result.transform)
        );
        self.last_refinement = Some((
            SensorPair::new(source, destination),
            result.transform.clone(),
        ));
        Ok(result)
    }

    /// Updates the working extrinsics of the pair, and their inverse.
    ///
    /// In relative mode the new extrinsics are `snapshot * transform`, in
    /// absolute mode `transform`. Both sensors are reported to the observer.
    pub fn apply_transform(
        &mut self,
        source: &str,
        destination: &str,
        transform: &Transform,
        mode: CalibMode,
    ) -> Result<()> {
        let snapshot = self.capture_snapshot(source, destination)?;
        let extrinsics = match mode {
            CalibMode::Relative => &snapshot * transform,
            CalibMode::Absolute => transform.clone(),
        };

        self.working.update(source, destination, &extrinsics)?;
        self.observer.extrinsics_dirty(source);
        self.observer.extrinsics_dirty(destination);
        Ok(())
    }

    /// Relative correction that applies `correction` on top of the current
    /// working extrinsics, `snapshot^-1 * working * correction`.
    ///
    /// Applying it in relative mode chains corrections: applying `T1` and then
    /// `compose_relative(T2)` is the same as applying `T1 * T2`.
    pub fn compose_relative(
        &mut self,
        source: &str,
        destination: &str,
        correction: &Transform,
    ) -> Result<Transform> {
        let snapshot = self.capture_snapshot(source, destination)?;
        let working = self
            .working
            .get(source, destination)
            .ok_or_else(|| Error::missing_sensor_path(source, destination, "no extrinsics"))?;
        let snapshot_inv = snapshot
            .try_inverse()
            .ok_or_else(|| Error::invalid_parameter("snapshot extrinsics are not invertible"))?;
        Ok(&(&snapshot_inv * working) * correction)
    }

    /// Applies an editor pose to the selected pair, using the session mode.
    pub fn apply_pose(&mut self, pose: &Pose) -> Result<()> {
        let pair = self
            .selection
            .clone()
            .ok_or_else(|| Error::invalid_parameter("no sensor pair selected"))?;
        self.apply_transform(&pair.source, &pair.destination, &pose.to_transform(), self.mode)?;
        self.pose = *pose;
        Ok(())
    }

    /// Replaces the extrinsics of the last refined pair with the refinement.
    /// The pair gets selected and the session switches to absolute mode.
    ///
    /// # Returns
    ///
    /// The new editor pose.
    pub fn apply_refinement(&mut self) -> Result<Pose> {
        let (pair, transform) = self
            .last_refinement
            .clone()
            .ok_or_else(|| Error::invalid_parameter("no refinement to apply"))?;

        self.mode = CalibMode::Absolute;
        self.select_pair(&pair.source, &pair.destination)?;
        let pose = Pose::from(&transform);
        self.apply_pose(&pose)?;
        Ok(pose)
    }

    /// Restores the working extrinsics of the pair to its snapshot.
    ///
    /// # Returns
    ///
    /// The editor pose matching the snapshot: the identity in relative mode,
    /// the snapshot pose in absolute mode.
    pub fn reset_pose(&mut self, source: &str, destination: &str, mode: CalibMode) -> Result<Pose> {
        let snapshot = self.capture_snapshot(source, destination)?;
        self.working.update(source, destination, &snapshot)?;
        self.observer.extrinsics_dirty(source);
        self.observer.extrinsics_dirty(destination);

        let pose = match mode {
            CalibMode::Relative => Pose::identity(),
            CalibMode::Absolute => Pose::from(&snapshot),
        };
        if self.selection.as_ref() == Some(&SensorPair::new(source, destination)) {
            self.pose = pose;
        }
        Ok(pose)
    }

    /// Saves the working extrinsics. See [`save_graph`].
    ///
    /// When every pair is saved, the working extrinsics become the original ones.
    pub fn save_all(&mut self) -> SaveReport {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let report = save_graph(&self.working, &self.platform, timestamp);
        if report.is_complete() {
            self.original = self.working.clone();
        } else {
            warn!(failures = report.failures.len(), "Some extrinsics were not saved");
        }
        report
    }
}
