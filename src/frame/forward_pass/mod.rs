pub mod forward_renderer;
pub mod object_3d_forward_pass;
