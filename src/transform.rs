use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};
use ndarray::{Array2, Axis};

use std::ops;

use crate::error::{Error, Result};

/// Tolerance on `R^T R - I` and `det(R) - 1` above which a rotation block is
/// considered drifted and gets projected back onto SO(3).
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-9;

/// Smallest singular value a rotation block may have to still be projected
/// onto SO(3). Below it the block is rank deficient.
pub const DEGENERATE_TOLERANCE: f64 = 1e-6;

/// Rigid transformation stored as a 4x4 homogeneous matrix.
///
/// Matrices loaded from disk or produced by long compositions may carry
/// numerical drift in their rotation block, so the raw matrix is kept
/// instead of an isometry. Use [`Transform::has_drift`] and
/// [`Transform::orthonormalized`] to detect and repair it.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform(Matrix4<f64>);

impl Default for Transform {
    fn default() -> Self {
        Self::eye()
    }
}

impl Transform {
    /// Identity transform.
    pub fn eye() -> Self {
        Self(Matrix4::identity())
    }

    /// Creates a transform from a translation and a rotation quaternion.
    pub fn new(translation: &Vector3<f64>, rotation: &UnitQuaternion<f64>) -> Self {
        Self::from_parts(&rotation.to_rotation_matrix().into_inner(), translation)
    }

    /// Creates a transform from a rotation matrix and a translation vector.
    /// The rotation is taken as is.
    pub fn from_parts(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_slice_mut::<3, 3>(0, 0).copy_from(rotation);
        matrix.fixed_slice_mut::<3, 1>(0, 3).copy_from(translation);
        Self(matrix)
    }

    /// Creates a transform from the se(3) vector `[tx, ty, tz, wx, wy, wz]`,
    /// where the rotation part is a scaled axis.
    pub fn from_se3_exp(translation_so3: &Vector6<f64>) -> Self {
        let translation = Vector3::new(translation_so3[0], translation_so3[1], translation_so3[2]);
        let so3 = Vector3::new(translation_so3[3], translation_so3[4], translation_so3[5]);
        Self::new(&translation, &UnitQuaternion::from_scaled_axis(so3))
    }

    /// Creates a transform from a homogeneous matrix.
    ///
    /// # Returns
    ///
    /// `InvalidParameter` if the matrix has non finite values or its last row
    /// is not `[0, 0, 0, 1]`.
    pub fn from_matrix4(matrix: &Matrix4<f64>) -> Result<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_parameter(
                "transform matrix has non finite values",
            ));
        }

        let bottom = matrix.fixed_slice::<1, 4>(3, 0);
        if bottom[0] != 0.0 || bottom[1] != 0.0 || bottom[2] != 0.0 || bottom[3] != 1.0 {
            return Err(Error::invalid_parameter(format!(
                "transform matrix last row should be [0, 0, 0, 1], found {bottom}"
            )));
        }

        Ok(Self(*matrix))
    }

    /// The homogeneous matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// The 3x3 rotation block, as stored.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.0.fixed_slice::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_slice::<3, 1>(0, 3).into_owned()
    }

    /// Rotation as a unit quaternion. Drifted rotations are projected onto SO(3) first.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        let rotation = if self.has_drift() {
            nearest_rotation(&self.rotation())
        } else {
            self.rotation()
        };
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation))
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.quaternion().angle()
    }

    /// Whether the rotation block is away from SO(3) by more than [`ORTHONORMAL_TOLERANCE`].
    pub fn has_drift(&self) -> bool {
        let rotation = self.rotation();
        let gram_error = (rotation.transpose() * rotation - Matrix3::identity()).amax();
        gram_error > ORTHONORMAL_TOLERANCE
            || (rotation.determinant() - 1.0).abs() > ORTHONORMAL_TOLERANCE
    }

    /// Whether the rotation block is rank deficient or not finite, too far
    /// from any rotation to be repaired.
    pub fn is_degenerate(&self) -> bool {
        let singular_values = self.rotation().singular_values();
        singular_values.iter().any(|value| !value.is_finite())
            || singular_values.min() < DEGENERATE_TOLERANCE
    }

    /// Copy of this transform with its rotation block replaced by the closest
    /// rotation matrix in the Frobenius sense.
    pub fn orthonormalized(&self) -> Self {
        Self::from_parts(&nearest_rotation(&self.rotation()), &self.translation())
    }

    /// True matrix inverse. The rotation is re-orthonormalized before the
    /// inversion when drift is detected.
    ///
    /// # Returns
    ///
    /// `None` if the matrix is singular or its rotation block is degenerate.
    pub fn try_inverse(&self) -> Option<Self> {
        if self.is_degenerate() {
            return None;
        }
        let matrix = if self.has_drift() {
            self.orthonormalized().0
        } else {
            self.0
        };
        matrix.try_inverse().map(Self)
    }

    /// Inverse for transforms known to be rigid, like the ones built from
    /// quaternions. Uses `R^T` and `-R^T t`.
    pub fn inverse(&self) -> Self {
        let rotation_t = self.rotation().transpose();
        Self::from_parts(&rotation_t, &(-rotation_t * self.translation()))
    }

    pub fn transform_vector(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation() * point + self.translation()
    }

    /// Applies only the rotation.
    pub fn transform_normal(&self, normal: &Vector3<f64>) -> Vector3<f64> {
        self.rotation() * normal
    }

    /// Transforms a (N x 3) array of points in place.
    pub fn transform(&self, mut rhs: Array2<f64>) -> Array2<f64> {
        let rotation = self.rotation();
        let translation = self.translation();
        for mut point in rhs.axis_iter_mut(Axis(0)) {
            let v = rotation * Vector3::new(point[0], point[1], point[2]) + translation;
            point[0] = v[0];
            point[1] = v[1];
            point[2] = v[2];
        }

        rhs
    }
}

/// Closest rotation matrix to `matrix`, using its SVD `U S V^T -> U V^T`
/// with a sign fix to avoid reflections.
fn nearest_rotation(matrix: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = matrix.svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => {
            let mut rotation = u * v_t;
            if rotation.determinant() < 0.0 {
                let mut u = u;
                u.column_mut(2).neg_mut();
                rotation = u * v_t;
            }
            rotation
        }
        _ => Matrix3::identity(),
    }
}

impl ops::Mul<&Array2<f64>> for &Transform {
    type Output = Array2<f64>;

    fn mul(self, rhs: &Array2<f64>) -> Self::Output {
        self.transform(rhs.clone())
    }
}

impl ops::Mul<&Vector3<f64>> for &Transform {
    type Output = Vector3<f64>;

    fn mul(self, rhs: &Vector3<f64>) -> Self::Output {
        self.transform_vector(rhs)
    }
}

impl ops::Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}

impl From<Transform> for Matrix4<f64> {
    fn from(transform: Transform) -> Self {
        transform.0
    }
}

impl approx::AbsDiffEq for Transform {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        approx::AbsDiffEq::abs_diff_eq(&self.0, &other.0, epsilon)
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.0.row_iter() {
            writeln!(
                f,
                "[{:>10.6}, {:>10.6}, {:>10.6}, {:>10.6}]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Transform;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};
    use ndarray::array;

    fn sample_transform() -> Transform {
        Transform::new(
            &Vector3::new(0., 0., 3.),
            &UnitQuaternion::from_scaled_axis(Vector3::y() * std::f64::consts::PI),
        )
    }

    #[test]
    fn test_mul_op() {
        let transform = Transform::eye();
        let points = array![[1., 2., 3.], [4., 5., 6.], [7., 8., 9.]];
        let mult_result = &transform * &points;

        assert_eq!(mult_result, points);

        let result = &sample_transform() * &array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]];
        assert_abs_diff_eq!(
            result,
            array![[-1.0, 2.0, 0.0], [-1.0, 2.0, 0.0]],
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_transform() {
        let mut points = array![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]];
        points = sample_transform().transform(points);

        assert_abs_diff_eq!(
            points,
            array![[-1.0, 2.0, 0.0], [-1.0, 2.0, 0.0]],
            epsilon = 1e-9
        );
    }

    #[test]
    fn should_reject_non_homogeneous_matrix() {
        let mut matrix = Matrix4::identity();
        matrix[(3, 0)] = 0.5;
        assert!(Transform::from_matrix4(&matrix).is_err());

        matrix[(3, 0)] = 0.0;
        matrix[(1, 2)] = f64::NAN;
        assert!(Transform::from_matrix4(&matrix).is_err());
    }

    #[test]
    fn should_repair_drifted_rotation() {
        let mut drifted = sample_transform().rotation();
        drifted[(0, 1)] += 1e-4;
        drifted[(2, 2)] *= 1.001;
        let transform = Transform::from_parts(&drifted, &Vector3::new(1.0, 2.0, 3.0));
        assert!(transform.has_drift());

        let repaired = transform.orthonormalized();
        assert!(!repaired.has_drift());
        assert_abs_diff_eq!(repaired.translation(), transform.translation());
        assert_abs_diff_eq!(
            repaired.rotation(),
            sample_transform().rotation(),
            epsilon = 1e-3
        );
    }

    #[test]
    fn should_invert_exactly() {
        let transform = Transform::new(
            &Vector3::new(0.3, -1.2, 2.0),
            &UnitQuaternion::from_euler_angles(0.1, -0.4, 1.2),
        );
        let inverse = transform.try_inverse().unwrap();

        assert_abs_diff_eq!(&transform * &inverse, Transform::eye(), epsilon = 1e-12);
        assert_abs_diff_eq!(inverse, transform.inverse(), epsilon = 1e-12);
    }

    #[test]
    fn should_not_invert_degenerate_rotation() {
        let zeros = Transform::from_parts(&Matrix3::zeros(), &Vector3::new(1.0, 2.0, 3.0));
        assert!(zeros.is_degenerate());
        assert!(zeros.try_inverse().is_none());

        let mut flattened = sample_transform().rotation();
        flattened.column_mut(2).fill(0.0);
        let flattened = Transform::from_parts(&flattened, &Vector3::zeros());
        assert!(flattened.is_degenerate());
        assert!(flattened.try_inverse().is_none());

        assert!(!sample_transform().is_degenerate());
    }

    #[test]
    fn should_compose_like_matrices() {
        let lhs = sample_transform();
        let rhs = Transform::new(
            &Vector3::new(1.0, 0.0, 0.0),
            &UnitQuaternion::from_scaled_axis(Vector3::z() * 0.3),
        );
        let composed = &lhs * &rhs;
        assert_abs_diff_eq!(
            *composed.matrix(),
            lhs.matrix() * rhs.matrix(),
            epsilon = 1e-12
        );
        let point = Vector3::new(0.5, 0.25, -1.0);
        assert_abs_diff_eq!(&composed * &point, &lhs * &(&rhs * &point), epsilon = 1e-12);
    }
}
