use nalgebra::Vector3;

pub struct PointPlaneDistance {}

fn se3_jacobian(source_point: &Vector3<f64>, target_normal: &Vector3<f64>) -> [f64; 6] {
    let twist = source_point.cross(target_normal);
    [
        target_normal[0],
        target_normal[1],
        target_normal[2],
        twist[0],
        twist[1],
        twist[2],
    ]
}

impl PointPlaneDistance {
    /// Computes the residual and the Jacobian of the point-plane distance.
    ///
    /// # Arguments
    ///
    /// * source_point - 3D point in the source frame.
    /// * target_point - 3D point in the target frame.
    /// * target_normal - Normal of the plane in the target frame.
    ///
    /// # Returns
    ///
    /// * The residual and its (6) Jacobian with respect to `[translation, rotation]`.
    pub fn jacobian(
        &self,
        source_point: &Vector3<f64>,
        target_point: &Vector3<f64>,
        target_normal: &Vector3<f64>,
    ) -> (f64, [f64; 6]) {
        let residual = (target_point - source_point).dot(target_normal);
        (residual, se3_jacobian(source_point, target_normal))
    }
}
