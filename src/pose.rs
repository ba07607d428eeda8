use nalgebra::{Rotation3, Vector3};
use serde_derive::{Deserialize, Serialize};

use crate::transform::Transform;

/// Unit of the Euler angles shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

/// Six degrees of freedom pose edited by the user: translation in meters and
/// static XYZ Euler angles (`R = Rz(rz) * Ry(ry) * Rx(rx)`) in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            x,
            y,
            z,
            rx,
            ry,
            rz,
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Decomposes a transform. Drifted rotations are projected onto SO(3) first.
    /// Near gimbal lock (`|ry| = pi/2`) the split between `rx` and `rz` is arbitrary.
    pub fn from_transform(transform: &Transform) -> Self {
        let (rx, ry, rz) = transform.quaternion().euler_angles();
        let translation = transform.translation();
        Self::new(translation[0], translation[1], translation[2], rx, ry, rz)
    }

    pub fn to_transform(&self) -> Transform {
        let rotation = Rotation3::from_euler_angles(self.rx, self.ry, self.rz);
        Transform::from_parts(rotation.matrix(), &Vector3::new(self.x, self.y, self.z))
    }

    /// Converts the angles of this (radians) pose into `unit` for display.
    pub fn to_unit(&self, unit: AngleUnit) -> Self {
        match unit {
            AngleUnit::Radians => *self,
            AngleUnit::Degrees => Self {
                rx: self.rx.to_degrees(),
                ry: self.ry.to_degrees(),
                rz: self.rz.to_degrees(),
                ..*self
            },
        }
    }

    /// Converts a pose whose angles are given in `unit` into radians.
    pub fn from_unit(&self, unit: AngleUnit) -> Self {
        match unit {
            AngleUnit::Radians => *self,
            AngleUnit::Degrees => Self {
                rx: self.rx.to_radians(),
                ry: self.ry.to_radians(),
                rz: self.rz.to_radians(),
                ..*self
            },
        }
    }
}

impl From<&Transform> for Pose {
    fn from(transform: &Transform) -> Self {
        Self::from_transform(transform)
    }
}

impl From<&Pose> for Transform {
    fn from(pose: &Pose) -> Self {
        pose.to_transform()
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "x: {:.4}, y: {:.4}, z: {:.4}, rx: {:.4}, ry: {:.4}, rz: {:.4}",
            self.x, self.y, self.z, self.rx, self.ry, self.rz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::UnitQuaternion;
    use rstest::rstest;

    #[rstest]
    #[case(Pose::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0))]
    #[case(Pose::new(1.5, -0.2, 0.7, 0.1, -0.3, 2.5))]
    #[case(Pose::new(-3.0, 4.0, 0.01, -2.9, 1.2, -0.8))]
    fn should_round_trip_through_transform(#[case] pose: Pose) {
        let back = Pose::from_transform(&pose.to_transform());
        assert_abs_diff_eq!(back.x, pose.x, epsilon = 1e-12);
        assert_abs_diff_eq!(back.y, pose.y, epsilon = 1e-12);
        assert_abs_diff_eq!(back.z, pose.z, epsilon = 1e-12);
        assert_abs_diff_eq!(back.rx, pose.rx, epsilon = 1e-9);
        assert_abs_diff_eq!(back.ry, pose.ry, epsilon = 1e-9);
        assert_abs_diff_eq!(back.rz, pose.rz, epsilon = 1e-9);
    }

    #[test]
    fn should_follow_static_xyz_convention() {
        let pose = Pose::new(0.0, 0.0, 0.0, 0.2, 0.0, 0.0);
        let expected = UnitQuaternion::from_scaled_axis(Vector3::x() * 0.2);
        assert_abs_diff_eq!(
            pose.to_transform().rotation(),
            expected.to_rotation_matrix().into_inner(),
            epsilon = 1e-12
        );

        let pose = Pose::new(0.0, 0.0, 0.0, 0.2, 0.0, 0.5);
        let expected = UnitQuaternion::from_scaled_axis(Vector3::z() * 0.5)
            * UnitQuaternion::from_scaled_axis(Vector3::x() * 0.2);
        assert_abs_diff_eq!(
            pose.to_transform().rotation(),
            expected.to_rotation_matrix().into_inner(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn should_convert_angle_units() {
        let pose = Pose::new(
            1.0,
            2.0,
            3.0,
            std::f64::consts::PI,
            0.0,
            -std::f64::consts::FRAC_PI_2,
        );
        let degrees = pose.to_unit(AngleUnit::Degrees);
        assert_abs_diff_eq!(degrees.rx, 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(degrees.rz, -90.0, epsilon = 1e-12);
        assert_eq!(degrees.x, 1.0);

        let back = degrees.from_unit(AngleUnit::Degrees);
        assert_abs_diff_eq!(back.rx, pose.rx, epsilon = 1e-12);
        assert_abs_diff_eq!(back.rz, pose.rz, epsilon = 1e-12);
    }

    #[test]
    fn should_display_four_decimals() {
        let pose = Pose::new(1.0, 0.123456, -2.0, 0.0, 0.5, 0.25);
        assert_eq!(
            pose.to_string(),
            "x: 1.0000, y: 0.1235, z: -2.0000, rx: 0.0000, ry: 0.5000, rz: 0.2500"
        );
    }
}
