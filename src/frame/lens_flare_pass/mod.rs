pub mod lens_flare_pass;
pub mod lens_flare_renderer;
