pub mod object_3d_shadow_pass;
pub mod shadow_map_renderer;
