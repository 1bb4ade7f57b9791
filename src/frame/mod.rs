pub mod driver;
pub mod forward_pass;
pub mod frame_plan;
pub mod hud;
pub mod lens_flare_pass;
pub mod scene_renderer;
pub mod shadow_pass;
