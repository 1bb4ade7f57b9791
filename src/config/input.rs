use std::collections::HashSet;

use winit::event::{DeviceEvent, ElementState, Event, VirtualKeyCode};

/// Keyboard and mouse state fed by the winit event stream. Shared
/// between the frame driver (which writes events into it) and update
/// strategies (which read held keys and consume the mouse delta).
#[derive(Debug, Default)]
pub struct InputState {
    key_held: HashSet<VirtualKeyCode>,
    mouse_dx: f32,
    mouse_dy: f32,
}

impl InputState {
    pub fn new() -> InputState {
        InputState::default()
    }

    pub fn handle_event(&mut self, event: &Event<()>) {
        match event {
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                self.add_mouse_delta(delta.0 as f32, delta.1 as f32);
            }
            Event::DeviceEvent {
                event: DeviceEvent::Key(input),
                ..
            } => {
                if let Some(key) = input.virtual_keycode {
                    self.handle_keyboard_input(key, input.state);
                }
            }
            _ => {}
        }
    }

    pub fn handle_keyboard_input(&mut self, key: VirtualKeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.key_held.insert(key);
            }
            ElementState::Released => {
                self.key_held.remove(&key);
            }
        }
    }

    pub fn key_held(&self, key: VirtualKeyCode) -> bool {
        self.key_held.contains(&key)
    }

    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_dx += dx;
        self.mouse_dy += dy;
    }

    /// Returns the accumulated mouse motion since the previous call and
    /// resets it, so one frame's look input is consumed exactly once.
    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        let delta = (self.mouse_dx, self.mouse_dy);
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        delta
    }

    pub fn press(&mut self, key: VirtualKeyCode) {
        self.handle_keyboard_input(key, ElementState::Pressed);
    }

    pub fn release(&mut self, key: VirtualKeyCode) {
        self.handle_keyboard_input(key, ElementState::Released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_track_press_and_release() {
        let mut input = InputState::new();
        input.press(VirtualKeyCode::W);
        assert!(input.key_held(VirtualKeyCode::W));

        input.release(VirtualKeyCode::W);
        assert!(!input.key_held(VirtualKeyCode::W));
    }

    #[test]
    fn mouse_delta_accumulates_and_is_consumed_once() {
        let mut input = InputState::new();
        input.add_mouse_delta(3.0, -1.0);
        input.add_mouse_delta(2.0, 2.0);

        assert_eq!(input.take_mouse_delta(), (5.0, 1.0));
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
    }
}
