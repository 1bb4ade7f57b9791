pub mod camera;
pub mod descriptor;
pub mod light;
pub mod mesh;
pub mod object3d;
pub mod scene;
pub mod transform;
pub mod update_strategies;
