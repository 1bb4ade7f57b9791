pub mod free_fly;
pub mod spin;

pub use free_fly::FreeFlyStrategy;
pub use spin::SpinStrategy;

use super::transform::Transform;

/// Read-only view of the scene handed to update strategies. This is an
/// owned value copy taken before the update walk, so a strategy can never
/// reach another entity's live state through it; the only thing a
/// strategy may mutate is the transform of its own entity.
#[derive(Clone, Debug, Default)]
pub struct SceneSnapshot {
    pub camera: Option<Transform>,
    pub objects: Vec<Transform>,
}

/// Pluggable per-entity per-frame behavior. `init` runs once when the
/// owning entity is built from its descriptor.
pub trait UpdateStrategy {
    fn init(&mut self, _transform: &mut Transform) {}

    fn update(&mut self, delta_time: f32, transform: &mut Transform, snapshot: &SceneSnapshot);
}
