pub mod mesh_converters;
pub mod texture_registry;
