use std::sync::Arc;

use crate::object_3d_loader::texture_registry::TextureData;

use super::mesh::Mesh;
use super::transform::Transform;
use super::update_strategies::{SceneSnapshot, UpdateStrategy};

/// A renderable entity: a transform, a shared mesh, an optional texture
/// and a flat base color. `texture_mix` blends between the base color
/// (0.0) and the texture (1.0); the alpha channel of the base color
/// decides the opaque/transparent render bucket.
pub struct Object3D {
    pub transform: Transform,
    pub mesh: Option<Arc<Mesh>>,
    pub texture: Option<Arc<TextureData>>,
    pub base_color: [f32; 4],
    pub texture_mix: f32,
    pub texture_scale: f32,
    pub visible: bool,
    pub strategy: Option<Box<dyn UpdateStrategy>>,
}

impl Object3D {
    pub fn new(mesh: Arc<Mesh>) -> Object3D {
        Object3D {
            transform: Transform::default(),
            mesh: Some(mesh),
            texture: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            texture_mix: 0.0,
            texture_scale: 1.0,
            visible: true,
            strategy: None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.base_color[3] >= 1.0
    }

    pub fn update(&mut self, delta_time: f32, snapshot: &SceneSnapshot) {
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.update(delta_time, &mut self.transform, snapshot);
        }
    }
}
