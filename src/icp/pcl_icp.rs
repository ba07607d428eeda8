use std::borrow::Cow;

use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;
use tracing::{debug, warn};

use super::cost_function::PointPlaneDistance;
use super::icp_params::{IcpMode, IcpParams};
use crate::{
    error::{Error, Result},
    kdtree::KdTree,
    optim::GaussNewton,
    pointcloud::PointCloud,
    transform::Transform,
};

/// Outcome of an ICP registration.
#[derive(Clone, Debug)]
pub struct IcpResult {
    /// Transform mapping source points into the target frame.
    pub transform: Transform,
    /// Ratio of source points with a correspondence under the final transform.
    pub fitness: f64,
    /// Root mean squared distance of those correspondences.
    pub inlier_rmse: f64,
    /// Number of correspondences under the final transform.
    pub correspondences: usize,
    pub iterations: usize,
    /// Whether the last update was under the convergence epsilon.
    pub converged: bool,
}

struct Match {
    source: Vector3<f64>,
    target_index: usize,
}

/// Standard Iterative Closest Point (ICP) algorithm for aligning two point clouds.
/// Supports the point-to-point and point-to-plane distances.
pub struct Icp<'target_lt> {
    // Parameters of the ICP algorithm.
    pub params: IcpParams,
    // Initial transformation to start the algorithm. Default is the identity.
    pub initial_transform: Transform,
    target: &'target_lt PointCloud,
    target_normals: Option<Cow<'target_lt, Array2<f64>>>,
    kdtree: KdTree,
}

impl<'target_lt> Icp<'target_lt> {
    /// Create a new ICP instance. The target is indexed once here.
    ///
    /// # Arguments
    ///
    /// * params - Parameters of the ICP algorithm.
    /// * target - Target point cloud. In plane mode, its normals are estimated if missing.
    pub fn new(params: IcpParams, target: &'target_lt PointCloud) -> Self {
        let target_normals = match params.mode {
            IcpMode::Point => None,
            IcpMode::Plane => Some(match &target.normals {
                Some(normals) => Cow::Borrowed(normals),
                None => Cow::Owned(target.estimate_normals(params.normal_neighbors)),
            }),
        };

        Self {
            params,
            initial_transform: Transform::eye(),
            target,
            target_normals,
            kdtree: KdTree::new(&target.points.view()),
        }
    }

    /// Aligns the source point cloud to the target point cloud.
    ///
    /// # Arguments
    ///
    /// * source - Source point cloud.
    ///
    /// # Returns
    ///
    /// The transformation that aligns the source point cloud to the target
    /// point cloud. Fails with `InsufficientData` on empty clouds or degenerate
    /// geometry, and with `NoOverlap` when an iteration finds no correspondence.
    pub fn align(&self, source: &PointCloud) -> Result<IcpResult> {
        self.params.validate()?;
        if source.is_empty() {
            return Err(Error::insufficient_data("source point cloud is empty"));
        }
        if self.target.is_empty() {
            return Err(Error::insufficient_data("target point cloud is empty"));
        }

        let mut optim_transform = self.initial_transform.clone();
        let mut converged = false;
        let mut iterations = 0;

        for iteration in 0..self.params.max_iterations {
            let matches = self.find_matches(source, &optim_transform);
            if matches.is_empty() {
                return Err(Error::NoOverlap {
                    max_distance: self.params.max_correspondence_distance,
                    iteration,
                });
            }

            let update = match self.params.mode {
                IcpMode::Point => self.point_to_point_update(&matches)?,
                IcpMode::Plane => self.point_to_plane_update(&matches)?,
            };
            optim_transform = &update * &optim_transform;
            iterations = iteration + 1;

            let (angle, translation) = (update.angle(), update.translation().norm());
            debug!(
                iteration,
                correspondences = matches.len(),
                angle,
                translation,
                "ICP iteration"
            );

            if angle <= self.params.convergence_epsilon
                && translation <= self.params.convergence_epsilon
            {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                iterations,
                epsilon = self.params.convergence_epsilon,
                "ICP did not converge"
            );
        }

        let matches = self.find_matches(source, &optim_transform);
        let squared_sum: f64 = matches
            .iter()
            .map(|m| (self.target.point(m.target_index) - m.source).norm_squared())
            .sum();
        let inlier_rmse = if matches.is_empty() {
            0.0
        } else {
            (squared_sum / matches.len() as f64).sqrt()
        };

        Ok(IcpResult {
            transform: optim_transform,
            fitness: matches.len() as f64 / source.len() as f64,
            inlier_rmse,
            correspondences: matches.len(),
            iterations,
            converged,
        })
    }

    /// Moves every source point with `transform` and pairs it with its
    /// nearest target point within the correspondence distance.
    fn find_matches(&self, source: &PointCloud, transform: &Transform) -> Vec<Match> {
        let max_distance = self.params.max_correspondence_distance;
        source
            .iter_points()
            .filter_map(|source_point| {
                let source_point = transform.transform_vector(&source_point);
                self.kdtree
                    .nearest3d(&source_point, max_distance)
                    .map(|(target_index, _)| Match {
                        source: source_point,
                        target_index,
                    })
            })
            .collect()
    }

    /// Closed form rigid transform between matched points (Kabsch).
    fn point_to_point_update(&self, matches: &[Match]) -> Result<Transform> {
        if matches.len() < 3 {
            return Err(Error::insufficient_data(format!(
                "point to point ICP needs at least 3 correspondences, found {}",
                matches.len()
            )));
        }

        let count = matches.len() as f64;
        let (source_sum, target_sum) = matches.iter().fold(
            (Vector3::zeros(), Vector3::zeros()),
            |(source_sum, target_sum), m| {
                (
                    source_sum + m.source,
                    target_sum + self.target.point(m.target_index),
                )
            },
        );
        let source_centroid: Vector3<f64> = source_sum / count;
        let target_centroid: Vector3<f64> = target_sum / count;

        let cross_covariance = matches.iter().fold(Matrix3::zeros(), |acc, m| {
            acc + (m.source - source_centroid)
                * (self.target.point(m.target_index) - target_centroid).transpose()
        });

        let svd = cross_covariance.svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(Error::insufficient_data(
                    "SVD of the correspondences' cross covariance failed",
                ))
            }
        };

        let mut v = v_t.transpose();
        let mut rotation = v * u.transpose();
        if rotation.determinant() < 0.0 {
            v.column_mut(2).neg_mut();
            rotation = v * u.transpose();
        }

        let translation = target_centroid - rotation * source_centroid;
        Ok(Transform::from_parts(&rotation, &translation))
    }

    /// One Gauss-Newton step on the point-to-plane distance.
    fn point_to_plane_update(&self, matches: &[Match]) -> Result<Transform> {
        let target_normals = self
            .target_normals
            .as_ref()
            .ok_or_else(|| Error::insufficient_data("target point cloud has no normals"))?;

        let geom_cost = PointPlaneDistance {};
        let mut optimizer = GaussNewton::<6>::new();
        for m in matches {
            let normal = target_normals.row(m.target_index);
            let target_normal = Vector3::new(normal[0], normal[1], normal[2]);
            let (residual, jacobian) = geom_cost.jacobian(
                &m.source,
                &self.target.point(m.target_index),
                &target_normal,
            );
            optimizer.step(residual, &jacobian);
        }

        let update = optimizer.solve().ok_or_else(|| {
            Error::insufficient_data(format!(
                "point to plane system is degenerate with {} correspondences",
                optimizer.len()
            ))
        })?;
        Ok(Transform::from_se3_exp(&update))
    }
}

/// Registers `source` onto `target` starting from `initial_transform`.
/// Builds a new [`Icp`], see [`Icp::align`].
pub fn register(
    source: &PointCloud,
    target: &PointCloud,
    initial_transform: &Transform,
    params: &IcpParams,
) -> Result<IcpResult> {
    let mut icp = Icp::new(params.clone(), target);
    icp.initial_transform = initial_transform.clone();
    icp.align(source)
}
