pub mod config;
pub mod error;
pub mod frame;
pub mod object_3d_loader;
pub mod scene_pkg;
