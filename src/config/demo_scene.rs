use std::f32::consts::{FRAC_PI_4, PI};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use cgmath::Vector3;

use crate::scene_pkg::descriptor::{
    MeshDescriptor, ObjectDescriptor, SceneDescriptor, ShadowSettings,
};
use crate::scene_pkg::update_strategies::{FreeFlyStrategy, SpinStrategy};

use super::input::InputState;

/// The built-in walkable scene: a textured floor, a ring of crates
/// (one of them slowly spinning, one tinted glass), a white light with
/// a visible marker and lens flare, and a first-person camera.
pub fn demo_scene(input: Arc<Mutex<InputState>>, aspect: f32) -> SceneDescriptor {
    let crate_texture = Some(PathBuf::from("assets/textures/crate.png"));

    let mut objects = vec![ObjectDescriptor::PhysicalObject {
        position: Vector3::new(0.0, -2.0, 0.0),
        rotation: Vector3::new(0.0, 0.0, 0.0),
        scale: Vector3::new(100.0, 1.0, 100.0),
        texture_scale: 100.0,
        mesh_name: "floor".to_string(),
        texture: Some(PathBuf::from("assets/textures/floor.png")),
        base_color: [0.45, 0.45, 0.45, 1.0],
        strategy: None,
    }];

    for (x, z) in [(-2.0, -2.0), (2.0, -2.0), (-2.0, 2.0), (2.0, 2.0)] {
        let spinning = x > 0.0 && z > 0.0;
        objects.push(ObjectDescriptor::PhysicalObject {
            position: Vector3::new(x, -1.0, z),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            texture_scale: 1.0,
            mesh_name: "cube".to_string(),
            texture: crate_texture.clone(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            strategy: if spinning {
                Some(Box::new(SpinStrategy::new(0.6)))
            } else {
                None
            },
        });
    }

    // A half-transparent tinted cube in the middle of the ring.
    objects.push(ObjectDescriptor::PhysicalObject {
        position: Vector3::new(0.0, -1.0, 0.0),
        rotation: Vector3::new(0.0, FRAC_PI_4, 0.0),
        scale: Vector3::new(1.0, 1.0, 1.0),
        texture_scale: 1.0,
        mesh_name: "cube".to_string(),
        texture: None,
        base_color: [0.3, 0.6, 1.0, 0.5],
        strategy: None,
    });

    objects.push(ObjectDescriptor::Light {
        color: [1.0, 1.0, 1.0],
        shininess: 32.0,
        ambient: 0.2,
        position: Vector3::new(0.0, 2.0, -5.0),
        look_at: Vector3::new(0.0, 0.0, 0.0),
        fovy: PI / 1.5,
        aspect: 1.0,
        near: 0.1,
        far: 100.0,
        mesh_name: Some("cube".to_string()),
        texture: None,
        lens_flare: true,
    });

    objects.push(ObjectDescriptor::Camera {
        position: Vector3::new(0.0, 2.0, 6.0),
        rotation: Vector3::new(0.0, 0.0, 0.0),
        fov: FRAC_PI_4,
        aspect,
        near: 0.1,
        far: 100.0,
        strategy: Some(Box::new(FreeFlyStrategy::new(input))),
    });

    SceneDescriptor {
        meshes: vec![
            MeshDescriptor {
                name: "cube".to_string(),
                source_path: PathBuf::from("assets/models/cube.obj"),
            },
            MeshDescriptor {
                name: "floor".to_string(),
                source_path: PathBuf::from("assets/models/floor.obj"),
            },
        ],
        objects,
        shadows: ShadowSettings {
            enabled: true,
            width: 2048,
            height: 2048,
        },
    }
}
