use crate::scene_pkg::transform::Transform;

use super::{SceneSnapshot, UpdateStrategy};

/// Scripted behavior: rotates the entity around Y at a constant rate
/// (radians per second).
pub struct SpinStrategy {
    pub rate: f32,
}

impl SpinStrategy {
    pub fn new(rate: f32) -> SpinStrategy {
        SpinStrategy { rate }
    }
}

impl UpdateStrategy for SpinStrategy {
    fn update(&mut self, delta_time: f32, transform: &mut Transform, _snapshot: &SceneSnapshot) {
        transform.rotation.y += self.rate * delta_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spins_at_a_constant_rate() {
        let mut strategy = SpinStrategy::new(0.5);
        let mut transform = Transform::default();

        strategy.update(2.0, &mut transform, &SceneSnapshot::default());
        assert_relative_eq!(transform.rotation.y, 1.0, epsilon = 1e-6);

        strategy.update(2.0, &mut transform, &SceneSnapshot::default());
        assert_relative_eq!(transform.rotation.y, 2.0, epsilon = 1e-6);
    }
}
