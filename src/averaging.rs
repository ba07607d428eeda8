use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};

use crate::transform::Transform;

/// Accumulates rigid transforms and averages them.
///
/// Translations are averaged arithmetically. Rotations are averaged by summing
/// their quaternions and normalizing the sum, which is only a good
/// approximation of the rotation mean when the rotations are close to each
/// other. It is not a geodesic mean.
///
/// Since `q` and `-q` are the same rotation, every quaternion is flipped to the
/// hemisphere of the first accumulated one before the sum.
#[derive(Clone, Debug, Default)]
pub struct TransformAccumulator {
    reference: Option<UnitQuaternion<f64>>,
    quaternion_sum: Vector4<f64>,
    translation_sum: Vector3<f64>,
    count: usize,
}

impl TransformAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transform to the average.
    pub fn add(&mut self, transform: &Transform) {
        let quaternion = transform.quaternion();
        let reference = *self.reference.get_or_insert(quaternion);

        let coords = quaternion.coords;
        let sign = if reference.coords.dot(&coords) < 0.0 {
            -1.0
        } else {
            1.0
        };

        self.quaternion_sum += coords * sign;
        self.translation_sum += transform.translation();
        self.count += 1;
    }

    /// Number of accumulated transforms.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The average transform, `None` when nothing was accumulated.
    pub fn mean(&self) -> Option<Transform> {
        if self.count == 0 {
            return None;
        }

        let translation = self.translation_sum / self.count as f64;
        let rotation = if self.quaternion_sum.norm_squared() > 0.0 {
            UnitQuaternion::from_quaternion(Quaternion::from_vector(self.quaternion_sum))
        } else {
            UnitQuaternion::identity()
        };

        Some(Transform::new(&translation, &rotation))
    }
}
