use std::path::PathBuf;

use cgmath::Vector3;

use super::update_strategies::UpdateStrategy;

/// A mesh to load before any object referencing it is built. Lookups are
/// by `name`; registry order does not matter.
pub struct MeshDescriptor {
    pub name: String,
    pub source_path: PathBuf,
}

/// Shadow-map configuration. Shadows activate only if they are enabled
/// here, a light is declared, and the depth framebuffer allocates.
#[derive(Clone, Copy, Debug)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for ShadowSettings {
    fn default() -> ShadowSettings {
        ShadowSettings {
            enabled: false,
            width: 2048,
            height: 2048,
        }
    }
}

/// Declarative description of one scene entity, discriminated by variant.
pub enum ObjectDescriptor {
    PhysicalObject {
        position: Vector3<f32>,
        rotation: Vector3<f32>,
        scale: Vector3<f32>,
        texture_scale: f32,
        mesh_name: String,
        texture: Option<PathBuf>,
        base_color: [f32; 4],
        strategy: Option<Box<dyn UpdateStrategy>>,
    },
    Light {
        color: [f32; 3],
        shininess: f32,
        ambient: f32,
        position: Vector3<f32>,
        look_at: Vector3<f32>,
        fovy: f32,
        aspect: f32,
        near: f32,
        far: f32,
        mesh_name: Option<String>,
        texture: Option<PathBuf>,
        lens_flare: bool,
    },
    Camera {
        position: Vector3<f32>,
        rotation: Vector3<f32>,
        fov: f32,
        aspect: f32,
        near: f32,
        far: f32,
        strategy: Option<Box<dyn UpdateStrategy>>,
    },
}

/// Everything `Scene::init` needs: meshes first, then the typed object
/// list in declaration order, then the shadow settings.
pub struct SceneDescriptor {
    pub meshes: Vec<MeshDescriptor>,
    pub objects: Vec<ObjectDescriptor>,
    pub shadows: ShadowSettings,
}
