use cgmath::{Matrix4, Rad, Vector3};

/// Position, Euler rotation (radians) and scale of an entity. The model
/// matrix is derived on demand, never stored, so strategies can mutate
/// the fields freely between frames.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Composes T · Rx · Ry · Rz · S. Rotation order is fixed to X then Y
    /// then Z; scale is applied last.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_x(Rad(self.rotation.x))
            * Matrix4::from_angle_y(Rad(self.rotation.y))
            * Matrix4::from_angle_z(Rad(self.rotation.z))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{SquareMatrix, Vector4};

    #[test]
    fn identity_for_default_transform() {
        let transform = Transform::default();
        assert_relative_eq!(transform.model_matrix(), Matrix4::identity());
    }

    #[test]
    fn matches_reference_composition() {
        let transform = Transform {
            position: Vector3::new(1.0, -2.0, 3.0),
            rotation: Vector3::new(0.3, -1.1, 2.4),
            scale: Vector3::new(2.0, 0.5, 1.5),
        };

        let reference = Matrix4::from_translation(Vector3::new(1.0, -2.0, 3.0))
            * Matrix4::from_angle_x(Rad(0.3))
            * Matrix4::from_angle_y(Rad(-1.1))
            * Matrix4::from_angle_z(Rad(2.4))
            * Matrix4::from_nonuniform_scale(2.0, 0.5, 1.5);

        assert_relative_eq!(transform.model_matrix(), reference, epsilon = 1e-6);
    }

    #[test]
    fn scale_is_applied_before_rotation() {
        // With scale innermost, a local X unit vector under a 90 degree Y
        // rotation ends up along -Z scaled by the X factor.
        let transform = Transform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vector3::new(3.0, 1.0, 1.0),
        };

        let mapped = transform.model_matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mapped.z, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z() {
        let transform = Transform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.7, 0.5, 0.2),
            scale: Vector3::new(1.0, 1.0, 1.0),
        };

        let swapped = Matrix4::from_angle_z(Rad(0.2))
            * Matrix4::from_angle_y(Rad(0.5))
            * Matrix4::from_angle_x(Rad(0.7));

        let produced = transform.model_matrix();
        // The reversed composition must differ; spot-check one element.
        assert!((produced.x.y - swapped.x.y).abs() > 1e-3);
    }
}
