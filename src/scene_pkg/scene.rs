use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::SceneInitError;
use crate::object_3d_loader::mesh_converters::ObjFileToMeshConverter;
use crate::object_3d_loader::texture_registry::TextureRegistry;

use super::camera::Camera;
use super::descriptor::{ObjectDescriptor, SceneDescriptor, ShadowSettings};
use super::light::Light;
use super::mesh::Mesh;
use super::object3d::Object3D;
use super::update_strategies::SceneSnapshot;

/// The aggregate root: mesh and texture registries, all renderable
/// objects, at most one light and the active camera. Built once from a
/// descriptor; all loading completes (or construction fails) before the
/// first render is permitted.
pub struct Scene {
    pub meshes: HashMap<String, Arc<Mesh>>,
    pub textures: TextureRegistry,
    pub objects: Vec<Object3D>,
    pub light: Option<Light>,
    pub camera: Option<Camera>,
    pub shadows: ShadowSettings,
}

impl Scene {
    /// An empty scene: no camera, so rendering is a blank-frame no-op.
    pub fn new() -> Scene {
        Scene {
            meshes: HashMap::new(),
            textures: TextureRegistry::new(),
            objects: Vec::new(),
            light: None,
            camera: None,
            shadows: ShadowSettings::default(),
        }
    }

    /// Loads every declared mesh, then builds one entity per object
    /// descriptor in declaration order. An unknown mesh name is fatal; a
    /// texture that fails to decode only degrades that object to its flat
    /// base color. If several lights are declared the last one wins.
    pub fn init(descriptor: SceneDescriptor) -> Result<Scene, SceneInitError> {
        let mut meshes = HashMap::new();
        for mesh_descriptor in &descriptor.meshes {
            let converter = ObjFileToMeshConverter::new(&mesh_descriptor.source_path);
            let mesh = converter.create_mesh()?;
            debug!(
                "loaded mesh {:?} ({} indices) from {}",
                mesh_descriptor.name,
                mesh.index_count(),
                mesh_descriptor.source_path.display()
            );
            meshes.insert(mesh_descriptor.name.clone(), Arc::new(mesh));
        }

        let mut textures = TextureRegistry::new();
        let mut objects = Vec::new();
        let mut light = None;
        let mut camera = None;

        for object_descriptor in descriptor.objects {
            match object_descriptor {
                ObjectDescriptor::PhysicalObject {
                    position,
                    rotation,
                    scale,
                    texture_scale,
                    mesh_name,
                    texture,
                    base_color,
                    strategy,
                } => {
                    let mesh = lookup_mesh(&meshes, &mesh_name)?;
                    let texture = texture.and_then(|path| load_texture(&mut textures, &path));
                    let texture_mix = if texture.is_some() { 1.0 } else { 0.0 };
                    let mut object = Object3D {
                        transform: super::transform::Transform {
                            position,
                            rotation,
                            scale,
                        },
                        mesh: Some(mesh),
                        texture,
                        base_color,
                        texture_mix,
                        texture_scale,
                        visible: true,
                        strategy,
                    };
                    if let Some(strategy) = object.strategy.as_mut() {
                        strategy.init(&mut object.transform);
                    }
                    objects.push(object);
                }
                ObjectDescriptor::Light {
                    color,
                    shininess,
                    ambient,
                    position,
                    look_at,
                    fovy,
                    aspect,
                    near,
                    far,
                    mesh_name,
                    texture,
                    lens_flare,
                } => {
                    let mesh = match mesh_name {
                        Some(name) => Some(lookup_mesh(&meshes, &name)?),
                        None => None,
                    };
                    let texture = texture.and_then(|path| load_texture(&mut textures, &path));
                    if light.is_some() {
                        debug!("multiple lights declared; keeping the last one");
                    }
                    light = Some(Light {
                        position,
                        look_at,
                        color,
                        shininess,
                        ambient,
                        fovy,
                        aspect,
                        near,
                        far,
                        mesh,
                        texture,
                        lens_flare,
                    });
                }
                ObjectDescriptor::Camera {
                    position,
                    rotation,
                    fov,
                    aspect,
                    near,
                    far,
                    strategy,
                } => {
                    let mut replacement = Camera {
                        fov,
                        aspect,
                        near,
                        far,
                        strategy,
                        ..Camera::default()
                    };
                    replacement.transform.position = position;
                    replacement.transform.rotation = rotation;
                    if let Some(strategy) = replacement.strategy.as_mut() {
                        strategy.init(&mut replacement.transform);
                    }
                    camera = Some(replacement);
                }
            }
        }

        Ok(Scene {
            meshes,
            textures,
            objects,
            light,
            camera: Some(camera.unwrap_or_default()),
            shadows: descriptor.shadows,
        })
    }

    /// Runs the camera's strategy, then every object's strategy in
    /// declaration order, each against the same pre-update snapshot.
    pub fn update(&mut self, delta_time: f32) {
        let snapshot = self.snapshot();

        if let Some(camera) = self.camera.as_mut() {
            if let Some(strategy) = camera.strategy.as_mut() {
                strategy.update(delta_time, &mut camera.transform, &snapshot);
            }
        }

        for object in &mut self.objects {
            object.update(delta_time, &snapshot);
        }
    }

    fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            camera: self.camera.as_ref().map(|camera| camera.transform),
            objects: self.objects.iter().map(|object| object.transform).collect(),
        }
    }
}

impl Default for Scene {
    fn default() -> Scene {
        Scene::new()
    }
}

fn lookup_mesh(
    meshes: &HashMap<String, Arc<Mesh>>,
    name: &str,
) -> Result<Arc<Mesh>, SceneInitError> {
    meshes
        .get(name)
        .cloned()
        .ok_or_else(|| SceneInitError::UnknownMeshReference {
            name: name.to_string(),
        })
}

fn load_texture(
    textures: &mut TextureRegistry,
    path: &std::path::Path,
) -> Option<Arc<crate::object_3d_loader::texture_registry::TextureData>> {
    match textures.load(path) {
        Ok(texture) => Some(texture),
        Err(err) => {
            warn!("rendering untextured: {}", err);
            None
        }
    }
}
