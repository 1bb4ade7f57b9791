use cgmath::{InnerSpace, Matrix4};

use crate::scene_pkg::scene::Scene;

/// State of the static shadow map. `PendingBake` moves to `Baked` on the
/// first planned frame and never transitions back: the light is assumed
/// immobile, so the depth map is rendered once per session and reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowState {
    Disabled,
    PendingBake,
    Baked,
}

/// Inputs for the lens-flare composite, valid for one frame.
#[derive(Clone, Copy, Debug)]
pub struct LensFlareParams {
    pub screen_position: [f32; 2],
    pub tint: [f32; 3],
}

/// CPU-side plan for one frame's render passes, in execution order:
/// optional shadow bake, the light marker, the opaque bucket
/// (declaration order, depth writes on), the transparent bucket
/// (farthest first, depth writes off), then the optional lens flare.
/// Bucket entries are indices into `scene.objects`.
#[derive(Debug, Default)]
pub struct FramePlan {
    pub bake_shadow_map: bool,
    pub shadows_active: bool,
    pub light_marker: bool,
    pub opaque: Vec<usize>,
    pub transparent: Vec<usize>,
    pub lens_flare: Option<LensFlareParams>,
}

/// Builds the per-frame plan. Owns the shadow-bake state machine so the
/// "rendered at most once" property lives in plain testable code rather
/// than in GPU bookkeeping.
pub struct FramePlanner {
    shadow: ShadowState,
}

impl FramePlanner {
    pub fn new(shadows_enabled: bool) -> FramePlanner {
        FramePlanner {
            shadow: if shadows_enabled {
                ShadowState::PendingBake
            } else {
                ShadowState::Disabled
            },
        }
    }

    /// Degraded mode: called when the shadow framebuffer fails to
    /// allocate. Shadows stay off for the rest of the session.
    pub fn disable_shadows(&mut self) {
        self.shadow = ShadowState::Disabled;
    }

    pub fn shadow_state(&self) -> ShadowState {
        self.shadow
    }

    /// Plans one frame. Returns `None` when the scene has no active
    /// camera, in which case the frame stays blank.
    pub fn plan(&mut self, scene: &Scene) -> Option<FramePlan> {
        let camera = scene.camera.as_ref()?;

        let bake_shadow_map =
            scene.light.is_some() && self.shadow == ShadowState::PendingBake;
        if bake_shadow_map {
            self.shadow = ShadowState::Baked;
        }
        let shadows_active = scene.light.is_some() && self.shadow == ShadowState::Baked;

        let mut opaque = Vec::new();
        let mut transparent = Vec::new();
        for (index, object) in scene.objects.iter().enumerate() {
            if !object.visible || object.mesh.is_none() {
                continue;
            }
            if object.is_opaque() {
                opaque.push(index);
            } else {
                transparent.push(index);
            }
        }

        let camera_position = camera.transform.position;
        transparent.sort_by(|&a, &b| {
            let da = (scene.objects[a].transform.position - camera_position).magnitude2();
            let db = (scene.objects[b].transform.position - camera_position).magnitude2();
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });

        let lens_flare = scene.light.as_ref().and_then(|light| {
            if !light.lens_flare {
                return None;
            }
            let view: Matrix4<f32> = camera.view_matrix();
            let projection = camera.projection_matrix();
            light
                .screen_position(&view, &projection)
                .map(|screen_position| LensFlareParams {
                    screen_position,
                    tint: light.color,
                })
        });

        Some(FramePlan {
            bake_shadow_map,
            shadows_active,
            light_marker: scene
                .light
                .as_ref()
                .map_or(false, |light| light.mesh.is_some()),
            opaque,
            transparent,
            lens_flare,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cgmath::Vector3;

    use crate::scene_pkg::camera::Camera;
    use crate::scene_pkg::light::Light;
    use crate::scene_pkg::mesh::{Mesh, Normal, Uv, Vertex};
    use crate::scene_pkg::object3d::Object3D;

    use super::*;

    fn triangle_mesh() -> Arc<Mesh> {
        Arc::new(Mesh {
            vertices: vec![Vertex::default(); 3],
            normals: vec![Normal::default(); 3],
            uvs: vec![Uv::default(); 3],
            indices: vec![0, 1, 2],
            has_uvs: false,
        })
    }

    fn object_at(z: f32, alpha: f32) -> Object3D {
        let mut object = Object3D::new(triangle_mesh());
        object.transform.position = Vector3::new(0.0, 0.0, z);
        object.base_color = [1.0, 1.0, 1.0, alpha];
        object
    }

    fn test_light(lens_flare: bool) -> Light {
        Light {
            position: Vector3::new(0.0, 2.0, -5.0),
            look_at: Vector3::new(0.0, 0.0, 0.0),
            color: [1.0, 0.9, 0.8],
            shininess: 32.0,
            ambient: 0.2,
            fovy: std::f32::consts::PI / 1.5,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
            mesh: None,
            texture: None,
            lens_flare,
        }
    }

    fn scene_with_camera() -> Scene {
        let mut scene = Scene::new();
        scene.camera = Some(Camera::default());
        scene
    }

    #[test]
    fn no_camera_means_no_plan() {
        let mut planner = FramePlanner::new(false);
        let scene = Scene::new();
        assert!(planner.plan(&scene).is_none());
    }

    #[test]
    fn opaque_objects_keep_declaration_order() {
        let mut scene = scene_with_camera();
        scene.objects.push(object_at(-1.0, 1.0));
        scene.objects.push(object_at(-5.0, 1.0));
        scene.objects.push(object_at(-3.0, 1.0));

        let mut planner = FramePlanner::new(false);
        let plan = planner.plan(&scene).unwrap();
        assert_eq!(plan.opaque, vec![0, 1, 2]);
        assert!(plan.transparent.is_empty());
    }

    #[test]
    fn transparent_objects_sort_farthest_first() {
        let mut scene = scene_with_camera();
        scene.objects.push(object_at(-2.0, 0.5)); // near
        scene.objects.push(object_at(-9.0, 0.5)); // far
        scene.objects.push(object_at(-5.0, 0.5)); // middle

        let mut planner = FramePlanner::new(false);
        let plan = planner.plan(&scene).unwrap();
        assert_eq!(plan.transparent, vec![1, 2, 0]);
    }

    #[test]
    fn mixed_buckets_split_by_alpha() {
        let mut scene = scene_with_camera();
        scene.objects.push(object_at(-10.0, 1.0));
        scene.objects.push(object_at(-5.0, 0.5));

        let mut planner = FramePlanner::new(false);
        let plan = planner.plan(&scene).unwrap();
        assert_eq!(plan.opaque, vec![0]);
        assert_eq!(plan.transparent, vec![1]);
    }

    #[test]
    fn invisible_and_meshless_objects_are_skipped() {
        let mut scene = scene_with_camera();
        let mut hidden = object_at(-1.0, 1.0);
        hidden.visible = false;
        scene.objects.push(hidden);
        let mut meshless = object_at(-1.0, 1.0);
        meshless.mesh = None;
        scene.objects.push(meshless);

        let mut planner = FramePlanner::new(false);
        let plan = planner.plan(&scene).unwrap();
        assert!(plan.opaque.is_empty());
        assert!(plan.transparent.is_empty());
    }

    #[test]
    fn shadow_map_bakes_exactly_once() {
        let mut scene = scene_with_camera();
        scene.light = Some(test_light(false));

        let mut planner = FramePlanner::new(true);
        let mut bake_count = 0;
        for _ in 0..10 {
            let plan = planner.plan(&scene).unwrap();
            if plan.bake_shadow_map {
                bake_count += 1;
            }
            assert!(plan.shadows_active);
        }
        assert_eq!(bake_count, 1);
        assert_eq!(planner.shadow_state(), ShadowState::Baked);
    }

    #[test]
    fn shadows_disabled_never_bake() {
        let mut scene = scene_with_camera();
        scene.light = Some(test_light(false));

        let mut planner = FramePlanner::new(false);
        for _ in 0..3 {
            let plan = planner.plan(&scene).unwrap();
            assert!(!plan.bake_shadow_map);
            assert!(!plan.shadows_active);
        }
    }

    #[test]
    fn framebuffer_failure_disables_shadows_for_the_session() {
        let mut scene = scene_with_camera();
        scene.light = Some(test_light(false));

        let mut planner = FramePlanner::new(true);
        planner.disable_shadows();
        let plan = planner.plan(&scene).unwrap();
        assert!(!plan.bake_shadow_map);
        assert!(!plan.shadows_active);
    }

    #[test]
    fn bake_failure_clears_shadows_from_the_frame_on() {
        let mut scene = scene_with_camera();
        scene.light = Some(test_light(false));

        // The first plan schedules the bake; the submission failing
        // means the map holds nothing worth sampling.
        let mut planner = FramePlanner::new(true);
        let plan = planner.plan(&scene).unwrap();
        assert!(plan.bake_shadow_map);
        planner.disable_shadows();

        for _ in 0..3 {
            let plan = planner.plan(&scene).unwrap();
            assert!(!plan.bake_shadow_map);
            assert!(!plan.shadows_active);
        }
    }

    #[test]
    fn lens_flare_requires_the_light_to_face_the_camera() {
        let mut scene = scene_with_camera();
        // Default camera sits at the origin looking down -Z; this light is
        // in front of it.
        let mut light = test_light(true);
        light.position = Vector3::new(0.0, 0.0, -5.0);
        scene.light = Some(light);

        let mut planner = FramePlanner::new(false);
        let plan = planner.plan(&scene).unwrap();
        let flare = plan.lens_flare.unwrap();
        assert_eq!(flare.tint, [1.0, 0.9, 0.8]);

        // Move the light behind the camera: the flare is skipped.
        scene.light.as_mut().unwrap().position = Vector3::new(0.0, 0.0, 5.0);
        let plan = planner.plan(&scene).unwrap();
        assert!(plan.lens_flare.is_none());
    }

    #[test]
    fn light_marker_planned_only_with_a_light_mesh() {
        let mut scene = scene_with_camera();
        scene.light = Some(test_light(false));

        let mut planner = FramePlanner::new(false);
        assert!(!planner.plan(&scene).unwrap().light_marker);

        scene.light.as_mut().unwrap().mesh = Some(triangle_mesh());
        assert!(planner.plan(&scene).unwrap().light_marker);
    }
}
