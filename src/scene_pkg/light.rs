use std::sync::Arc;

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad, Vector3};

use crate::object_3d_loader::texture_registry::TextureData;

use super::mesh::Mesh;

/// The scene's single light. Its perspective frustum exists solely to
/// render the shadow depth map from the light's point of view; the light
/// itself is assumed immobile for the lifetime of the session.
pub struct Light {
    pub position: Vector3<f32>,
    pub look_at: Vector3<f32>,
    pub color: [f32; 3],
    pub shininess: f32,
    pub ambient: f32,
    pub fovy: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mesh: Option<Arc<Mesh>>,
    pub texture: Option<Arc<TextureData>>,
    pub lens_flare: bool,
}

impl Light {
    /// The light VP matrix: perspective projection composed with a
    /// look-at view from the light's position toward its target.
    pub fn view_projection(&self) -> Matrix4<f32> {
        let projection = cgmath::perspective(Rad(self.fovy), self.aspect, self.near, self.far);
        let view = Matrix4::look_at_rh(
            Point3::from_vec(self.position),
            Point3::from_vec(self.look_at),
            Vector3::unit_y(),
        );
        projection * view
    }

    /// Projects the light's world position through the camera's view and
    /// projection into normalized screen coordinates ([0, 1] with the
    /// origin at the top left). Returns `None` when the light sits behind
    /// the camera (clip-space w <= 0), which suppresses the lens flare.
    pub fn screen_position(
        &self,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Option<[f32; 2]> {
        let clip = projection * view * self.position.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some([
            0.5 * (clip.x / clip.w + 1.0),
            0.5 * (1.0 - clip.y / clip.w),
        ])
    }
}
