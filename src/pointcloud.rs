use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::transform::Transform;

/// Unordered set of 3D points expressed in a sensor frame.
#[derive(Clone, Debug)]
pub struct PointCloud {
    /// Points, shape is (N x 3).
    pub points: Array2<f64>,
    /// Optional per point normals, shape is (N x 3).
    pub normals: Option<Array2<f64>>,
}

impl PointCloud {
    pub fn new(points: Array2<f64>) -> Result<Self> {
        if points.ncols() != 3 {
            return Err(Error::invalid_parameter(format!(
                "points should have shape (N, 3), found {:?}",
                points.shape()
            )));
        }

        Ok(Self {
            points,
            normals: None,
        })
    }

    pub fn from_points(points: &[Vector3<f64>]) -> Self {
        Self {
            points: Array2::from_shape_fn((points.len(), 3), |(i, c)| points[i][c]),
            normals: None,
        }
    }

    pub fn empty() -> Self {
        Self::from_points(&[])
    }

    /// Attaches normals, which must have the same shape as the points.
    pub fn with_normals(mut self, normals: Array2<f64>) -> Result<Self> {
        if normals.shape() != self.points.shape() {
            return Err(Error::invalid_parameter(format!(
                "normals shape {:?} doesn't match points shape {:?}",
                normals.shape(),
                self.points.shape()
            )));
        }
        self.normals = Some(normals);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.points.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Vector3<f64> {
        let row = self.points.row(index);
        Vector3::new(row[0], row[1], row[2])
    }

    pub fn iter_points(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.points
            .outer_iter()
            .map(|row| Vector3::new(row[0], row[1], row[2]))
    }

    /// Estimates one normal per point from the covariance of its `k` nearest
    /// neighbors. Normals point towards the sensor origin. Points with less
    /// than 3 neighbors get a zero normal.
    pub fn estimate_normals(&self, k: usize) -> Array2<f64> {
        let kdtree = KdTree::new(&self.points.view());

        let normals: Vec<Vector3<f64>> = (0..self.len())
            .into_par_iter()
            .map(|index| -> Vector3<f64> {
                let point = self.point(index);
                let neighbors = kdtree.knearest3d(&point, k);
                if neighbors.len() < 3 {
                    return Vector3::zeros();
                }

                let centroid = neighbors
                    .iter()
                    .fold(Vector3::zeros(), |acc, (idx, _)| acc + self.point(*idx))
                    / neighbors.len() as f64;
                let covariance = neighbors.iter().fold(Matrix3::zeros(), |acc, (idx, _)| {
                    let centered = self.point(*idx) - centroid;
                    acc + centered * centered.transpose()
                });

                let eigen = SymmetricEigen::new(covariance);
                let smallest = eigen.eigenvalues.imin();
                let normal: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned();
                if normal.dot(&point) > 0.0 {
                    -normal
                } else {
                    normal
                }
            })
            .collect();

        Array2::from_shape_fn((normals.len(), 3), |(i, c)| normals[i][c])
    }

    /// Fills [`PointCloud::normals`] using [`PointCloud::estimate_normals`].
    pub fn compute_normals(&mut self, k: usize) {
        self.normals = Some(self.estimate_normals(k));
    }
}

impl std::ops::Mul<&PointCloud> for &Transform {
    type Output = PointCloud;
    fn mul(self, rhs: &PointCloud) -> PointCloud {
        let rotation = Transform::from_parts(&self.rotation(), &Vector3::zeros());
        PointCloud {
            points: self * &rhs.points,
            normals: rhs.normals.as_ref().map(|normals| &rotation * normals),
        }
    }
}

/// Point cloud captured by a sensor at a given time.
#[derive(Clone, Debug)]
pub struct PointCloudFrame {
    /// Capture timestamp, in microseconds.
    pub timestamp: u64,
    pub cloud: PointCloud,
}

impl PointCloudFrame {
    pub fn new(timestamp: u64, cloud: PointCloud) -> Self {
        Self { timestamp, cloud }
    }
}
