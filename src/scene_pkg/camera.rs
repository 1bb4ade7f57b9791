use cgmath::{Matrix4, Rad};

use super::transform::Transform;
use super::update_strategies::UpdateStrategy;

/// The single active camera. The view matrix is the inverse of the
/// camera's placement: rotate around X, then Y, then translate by the
/// negated position. Roll is not modeled.
pub struct Camera {
    pub transform: Transform,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub strategy: Option<Box<dyn UpdateStrategy>>,
}

impl Camera {
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Rad(self.transform.rotation.x))
            * Matrix4::from_angle_y(Rad(self.transform.rotation.y))
            * Matrix4::from_translation(-self.transform.position)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(Rad(self.fov), self.aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            transform: Transform::default(),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 1920.0 / 1080.0,
            near: 0.1,
            far: 100.0,
            strategy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{SquareMatrix, Vector3, Vector4};

    #[test]
    fn view_matrix_inverts_placement() {
        let mut camera = Camera::default();
        camera.transform.position = Vector3::new(0.0, 2.0, 6.0);

        // A point at the camera's own position maps to the view-space origin.
        let mapped = camera.view_matrix() * Vector4::new(0.0, 2.0, 6.0, 1.0);
        assert_relative_eq!(mapped.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mapped.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn view_matrix_matches_reference_composition() {
        let mut camera = Camera::default();
        camera.transform.position = Vector3::new(1.0, 2.0, 3.0);
        camera.transform.rotation = Vector3::new(0.2, -0.4, 0.0);

        let reference = Matrix4::from_angle_x(Rad(0.2))
            * Matrix4::from_angle_y(Rad(-0.4))
            * Matrix4::from_translation(Vector3::new(-1.0, -2.0, -3.0));

        assert_relative_eq!(camera.view_matrix(), reference, epsilon = 1e-6);
    }

    #[test]
    fn default_camera_is_at_origin_with_identity_view() {
        let camera = Camera::default();
        assert_relative_eq!(camera.view_matrix(), Matrix4::identity());
    }
}
