use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use cgmath::Vector3;

use ember3d::config::input::InputState;
use ember3d::frame::frame_plan::FramePlanner;
use ember3d::scene_pkg::descriptor::{
    MeshDescriptor, ObjectDescriptor, SceneDescriptor, ShadowSettings,
};
use ember3d::scene_pkg::scene::Scene;
use ember3d::scene_pkg::update_strategies::{FreeFlyStrategy, SpinStrategy};
use winit::event::VirtualKeyCode;

fn write_obj(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "ember3d_pipeline_{}_{}.obj",
        tag,
        std::process::id()
    ));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "v -1 -1 0\nv 1 -1 0\nv 0 1 0").unwrap();
    writeln!(file, "vt 0 0\nvt 1 0\nvt 0.5 1").unwrap();
    writeln!(file, "vn 0 0 1\nvn 0 0 1\nvn 0 0 1").unwrap();
    writeln!(file, "f 1/1/1 2/2/2 3/3/3").unwrap();
    path
}

fn cube(position: Vector3<f32>, alpha: f32) -> ObjectDescriptor {
    ObjectDescriptor::PhysicalObject {
        position,
        rotation: Vector3::new(0.0, 0.0, 0.0),
        scale: Vector3::new(1.0, 1.0, 1.0),
        texture_scale: 1.0,
        mesh_name: "cube".to_string(),
        texture: None,
        base_color: [1.0, 1.0, 1.0, alpha],
        strategy: None,
    }
}

fn light(lens_flare: bool) -> ObjectDescriptor {
    ObjectDescriptor::Light {
        color: [1.0, 1.0, 1.0],
        shininess: 32.0,
        ambient: 0.2,
        position: Vector3::new(0.0, 2.0, -5.0),
        look_at: Vector3::new(0.0, 0.0, 0.0),
        fovy: std::f32::consts::PI / 1.5,
        aspect: 1.0,
        near: 0.1,
        far: 100.0,
        mesh_name: Some("cube".to_string()),
        texture: None,
        lens_flare,
    }
}

fn camera() -> ObjectDescriptor {
    ObjectDescriptor::Camera {
        position: Vector3::new(0.0, 2.0, 6.0),
        rotation: Vector3::new(0.0, 0.0, 0.0),
        fov: std::f32::consts::FRAC_PI_4,
        aspect: 16.0 / 9.0,
        near: 0.1,
        far: 100.0,
        strategy: None,
    }
}

/// A session over a full scene: shadows bake on the first frame only,
/// buckets stay stable, scripted rotation advances between frames and
/// the flare tracks the light.
#[test]
fn full_scene_session() {
    let obj = write_obj("full");
    let mut spinner = cube(Vector3::new(2.0, -1.0, 2.0), 1.0);
    if let ObjectDescriptor::PhysicalObject { strategy, .. } = &mut spinner {
        *strategy = Some(Box::new(SpinStrategy::new(1.0)));
    }

    let mut scene = Scene::init(SceneDescriptor {
        meshes: vec![MeshDescriptor {
            name: "cube".to_string(),
            source_path: obj.clone(),
        }],
        objects: vec![
            cube(Vector3::new(-2.0, -1.0, -2.0), 1.0),
            spinner,
            cube(Vector3::new(0.0, -1.0, 0.0), 0.5),
            cube(Vector3::new(0.0, -1.0, -8.0), 0.5),
            light(false),
            camera(),
        ],
        shadows: ShadowSettings {
            enabled: true,
            width: 2048,
            height: 2048,
        },
    })
    .unwrap();
    std::fs::remove_file(obj).ok();

    let mut planner = FramePlanner::new(scene.shadows.enabled);
    let mut bakes = 0;
    for frame in 0..5 {
        let plan = planner.plan(&scene).unwrap();
        if plan.bake_shadow_map {
            bakes += 1;
            assert_eq!(frame, 0);
        }
        assert!(plan.shadows_active);
        assert!(plan.light_marker);

        // Opaque stays in declaration order; transparent runs far to near.
        assert_eq!(plan.opaque, vec![0, 1]);
        assert_eq!(plan.transparent, vec![3, 2]);
        // Light marker was declared without a flare.
        assert!(plan.lens_flare.is_none());

        scene.update(0.25);
    }
    assert_eq!(bakes, 1);

    // Five quarter-second steps at 1 rad/s.
    let spun = scene.objects[1].transform.rotation.y;
    assert!((spun - 1.25).abs() < 1e-5, "spun {}", spun);
    assert_eq!(scene.objects[0].transform.rotation.y, 0.0);
}

/// A lit scene with the flare enabled: the flare follows the light onto
/// the screen and disappears once the camera turns its back on it.
#[test]
fn lens_flare_follows_the_camera() {
    let obj = write_obj("flare");
    let mut scene = Scene::init(SceneDescriptor {
        meshes: vec![MeshDescriptor {
            name: "cube".to_string(),
            source_path: obj.clone(),
        }],
        objects: vec![cube(Vector3::new(0.0, -1.0, 0.0), 1.0), light(true), camera()],
        shadows: ShadowSettings::default(),
    })
    .unwrap();
    std::fs::remove_file(obj).ok();

    let mut planner = FramePlanner::new(false);

    // Camera at z=6 looking down -Z sees the light at z=-5.
    let plan = planner.plan(&scene).unwrap();
    let flare = plan.lens_flare.expect("light in view");
    assert!(flare.screen_position[0] > 0.0 && flare.screen_position[0] < 1.0);

    // Turn half a revolution: the light is now behind the camera.
    if let Some(camera) = scene.camera.as_mut() {
        camera.transform.rotation.y = std::f32::consts::PI;
    }
    let plan = planner.plan(&scene).unwrap();
    assert!(plan.lens_flare.is_none());

    // Shadows were never enabled, so nothing ever baked.
    assert!(!plan.bake_shadow_map);
    assert!(!plan.shadows_active);
}

/// A lone opaque cube with shadows disabled plans a single main-pass
/// draw and no depth pass; adding a nearer transparent object keeps
/// the opaque draw first regardless of declaration order.
#[test]
fn opaque_draws_before_transparent() {
    let obj = write_obj("buckets");

    // Transparent at distance 5 declared before opaque at distance 10,
    // both straight down -Z from the camera at (0, 2, 6).
    let mut scene = Scene::init(SceneDescriptor {
        meshes: vec![MeshDescriptor {
            name: "cube".to_string(),
            source_path: obj.clone(),
        }],
        objects: vec![
            cube(Vector3::new(0.0, 2.0, 1.0), 0.5),
            cube(Vector3::new(0.0, 2.0, -4.0), 1.0),
            camera(),
        ],
        shadows: ShadowSettings::default(),
    })
    .unwrap();
    std::fs::remove_file(obj).ok();

    scene.update(0.0);
    let mut planner = FramePlanner::new(false);
    let plan = planner.plan(&scene).unwrap();
    assert!(!plan.bake_shadow_map);
    assert_eq!(plan.opaque, vec![1]);
    assert_eq!(plan.transparent, vec![0]);

    // Hiding the transparent object leaves exactly the one opaque draw.
    scene.objects[0].visible = false;
    let plan = planner.plan(&scene).unwrap();
    assert_eq!(plan.opaque, vec![1]);
    assert!(plan.transparent.is_empty());
}

/// Driving the camera strategy through the input state moves the
/// camera the same way the window loop would.
#[test]
fn free_fly_camera_walks_through_the_scene() {
    let obj = write_obj("walk");
    let input = Arc::new(Mutex::new(InputState::new()));

    let mut camera = camera();
    if let ObjectDescriptor::Camera { strategy, .. } = &mut camera {
        *strategy = Some(Box::new(FreeFlyStrategy::new(input.clone())));
    }

    let mut scene = Scene::init(SceneDescriptor {
        meshes: vec![MeshDescriptor {
            name: "cube".to_string(),
            source_path: obj.clone(),
        }],
        objects: vec![cube(Vector3::new(0.0, -1.0, 0.0), 1.0), camera],
        shadows: ShadowSettings::default(),
    })
    .unwrap();
    std::fs::remove_file(obj).ok();

    input.lock().unwrap().press(VirtualKeyCode::W);
    for _ in 0..10 {
        scene.update(0.1);
    }

    let position = scene.camera.as_ref().unwrap().transform.position;
    assert!(position.z < 6.0 - 4.0, "camera barely moved: {:?}", position);

    // No light declared: frames still plan, just without shadows or
    // marker.
    let mut planner = FramePlanner::new(false);
    let plan = planner.plan(&scene).unwrap();
    assert_eq!(plan.opaque, vec![0]);
    assert!(!plan.light_marker);
    assert!(plan.lens_flare.is_none());
}
