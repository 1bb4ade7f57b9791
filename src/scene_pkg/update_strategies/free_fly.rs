use std::sync::{Arc, Mutex};

use cgmath::{InnerSpace, Matrix3, Rad, Vector3};
use winit::event::VirtualKeyCode;

use crate::config::input::InputState;
use crate::scene_pkg::transform::Transform;

use super::{SceneSnapshot, UpdateStrategy};

const MOVE_SPEED: f32 = 5.0;
const SPRINT_MULTIPLIER: f32 = 1.5;
const MOUSE_SENSITIVITY: f32 = 0.002;
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.1;
const GRAVITY: f32 = -9.8;
const JUMP_FORCE: f32 = 5.0;
const FLOOR_HEIGHT: f32 = 0.0;
const EYE_HEIGHT: f32 = 2.0;

/// First-person walk controller: WASD relative to the current heading,
/// mouse look with pitch clamping, sprint on Shift, jump on Space with
/// gravity pulling back down to a fixed floor plane at eye height.
pub struct FreeFlyStrategy {
    input: Arc<Mutex<InputState>>,
    vertical_velocity: f32,
    grounded: bool,
}

impl FreeFlyStrategy {
    pub fn new(input: Arc<Mutex<InputState>>) -> FreeFlyStrategy {
        FreeFlyStrategy {
            input,
            vertical_velocity: 0.0,
            grounded: true,
        }
    }
}

impl UpdateStrategy for FreeFlyStrategy {
    fn update(&mut self, delta_time: f32, transform: &mut Transform, _snapshot: &SceneSnapshot) {
        let (mouse_dx, mouse_dy, jump, sprint, key_w, key_s, key_a, key_d) = {
            let mut input = self.input.lock().unwrap();
            let (dx, dy) = input.take_mouse_delta();
            (
                dx,
                dy,
                input.key_held(VirtualKeyCode::Space),
                input.key_held(VirtualKeyCode::LShift),
                input.key_held(VirtualKeyCode::W),
                input.key_held(VirtualKeyCode::S),
                input.key_held(VirtualKeyCode::A),
                input.key_held(VirtualKeyCode::D),
            )
        };

        transform.rotation.y += mouse_dx * MOUSE_SENSITIVITY;
        transform.rotation.x =
            (transform.rotation.x + mouse_dy * MOUSE_SENSITIVITY).clamp(-MAX_PITCH, MAX_PITCH);

        if jump && self.grounded {
            self.vertical_velocity = JUMP_FORCE;
            self.grounded = false;
        }
        if !self.grounded {
            self.vertical_velocity += GRAVITY * delta_time;
        }
        transform.position.y += self.vertical_velocity * delta_time;
        if transform.position.y <= FLOOR_HEIGHT + EYE_HEIGHT {
            transform.position.y = FLOOR_HEIGHT + EYE_HEIGHT;
            self.vertical_velocity = 0.0;
            self.grounded = true;
        }

        let heading = Matrix3::from_angle_y(Rad(-transform.rotation.y));
        let forward = heading * Vector3::new(0.0, 0.0, -1.0);
        let right = heading * Vector3::new(1.0, 0.0, 0.0);

        let mut direction = Vector3::new(0.0, 0.0, 0.0);
        if key_w {
            direction += forward;
        }
        if key_s {
            direction -= forward;
        }
        if key_d {
            direction += right;
        }
        if key_a {
            direction -= right;
        }

        if direction.magnitude2() > 0.0 {
            let speed = MOVE_SPEED * if sprint { SPRINT_MULTIPLIER } else { 1.0 };
            transform.position += direction.normalize() * speed * delta_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn strategy_with_input() -> (FreeFlyStrategy, Arc<Mutex<InputState>>) {
        let input = Arc::new(Mutex::new(InputState::new()));
        (FreeFlyStrategy::new(input.clone()), input)
    }

    fn grounded_transform() -> Transform {
        let mut transform = Transform::default();
        transform.position.y = EYE_HEIGHT;
        transform
    }

    #[test]
    fn forward_key_moves_along_negative_z() {
        let (mut strategy, input) = strategy_with_input();
        input.lock().unwrap().press(VirtualKeyCode::W);

        let mut transform = grounded_transform();
        strategy.update(1.0, &mut transform, &SceneSnapshot::default());

        assert_relative_eq!(transform.position.z, -MOVE_SPEED, epsilon = 1e-5);
        assert_relative_eq!(transform.position.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn movement_follows_heading() {
        let (mut strategy, input) = strategy_with_input();
        input.lock().unwrap().press(VirtualKeyCode::W);

        let mut transform = grounded_transform();
        transform.rotation.y = std::f32::consts::FRAC_PI_2;
        strategy.update(1.0, &mut transform, &SceneSnapshot::default());

        // Yawed a quarter turn, "forward" is now along -X.
        assert_relative_eq!(transform.position.x, -MOVE_SPEED, epsilon = 1e-4);
        assert_relative_eq!(transform.position.z, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn sprint_multiplies_speed() {
        let (mut strategy, input) = strategy_with_input();
        {
            let mut input = input.lock().unwrap();
            input.press(VirtualKeyCode::W);
            input.press(VirtualKeyCode::LShift);
        }

        let mut transform = grounded_transform();
        strategy.update(1.0, &mut transform, &SceneSnapshot::default());

        assert_relative_eq!(
            transform.position.z,
            -MOVE_SPEED * SPRINT_MULTIPLIER,
            epsilon = 1e-4
        );
    }

    #[test]
    fn jump_rises_then_gravity_returns_to_eye_height() {
        let (mut strategy, input) = strategy_with_input();
        input.lock().unwrap().press(VirtualKeyCode::Space);

        let mut transform = grounded_transform();
        strategy.update(0.1, &mut transform, &SceneSnapshot::default());
        assert!(transform.position.y > EYE_HEIGHT);

        input.lock().unwrap().release(VirtualKeyCode::Space);
        for _ in 0..100 {
            strategy.update(0.1, &mut transform, &SceneSnapshot::default());
        }
        assert_relative_eq!(transform.position.y, EYE_HEIGHT, epsilon = 1e-5);
        assert!(strategy.grounded);
    }

    #[test]
    fn pitch_is_clamped() {
        let (mut strategy, input) = strategy_with_input();
        input.lock().unwrap().add_mouse_delta(0.0, 1.0e6);

        let mut transform = grounded_transform();
        strategy.update(0.016, &mut transform, &SceneSnapshot::default());

        assert_relative_eq!(transform.rotation.x, MAX_PITCH, epsilon = 1e-6);
    }
}
