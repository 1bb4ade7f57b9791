pub mod demo_scene;
pub mod input;
pub mod vulkan;
