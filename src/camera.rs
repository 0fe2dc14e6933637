//! Free-fly camera.
//!
//! Decoupled from playback: movement integrates wall-clock frame deltas,
//! while the show itself runs off the audio clock. The host toggles camera
//! control on and off; while off, no input reaches it.

use glam::{Mat4, Vec3};
use winit::event::KeyEvent;
use winit::keyboard::{KeyCode, PhysicalKey};

pub const CAMERA_VELOCITY: f32 = 50.0;
const MOUSE_SENSITIVITY: f32 = 0.0025;
const PITCH_LIMIT: f32 = 1.54;

#[derive(Default, Clone, Copy)]
pub struct MovementState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl MovementState {
    const fn to_direction(&self, positive: bool, negative: bool) -> f32 {
        match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    const fn velocity(&self) -> (f32, f32, f32) {
        (
            self.to_direction(self.forward, self.backward),
            self.to_direction(self.right, self.left),
            self.to_direction(self.up, self.down),
        )
    }
}

pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub movement: MovementState,
    pub velocity: f32,
    fov_y_radians: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 6.0),
            // yaw PI looks down the tunnel (-z)
            yaw: std::f32::consts::PI,
            pitch: 0.0,
            movement: MovementState::default(),
            velocity: CAMERA_VELOCITY,
            fov_y_radians: 60f32.to_radians(),
            aspect,
            near: 1.0,
            far: 1000.0,
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    /// Integrate held movement keys over the frame delta.
    pub fn update(&mut self, delta_seconds: f32) {
        let (fwd, right_dir, up_dir) = self.movement.velocity();
        let step = self.velocity * delta_seconds;
        self.position += self.forward() * fwd * step
            + self.right() * right_dir * step
            + Vec3::Y * up_dir * step;
    }

    /// Apply a mouse delta. Pitch clamps short of the poles.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch + dy * MOUSE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far);
        let view = Mat4::look_to_rh(self.position, self.forward(), Vec3::Y);
        proj * view
    }

    pub fn process_keyboard(&mut self, event: &KeyEvent) {
        let is_pressed = event.state.is_pressed();
        if let PhysicalKey::Code(keycode) = event.physical_key {
            match keycode {
                KeyCode::KeyW => self.movement.forward = is_pressed,
                KeyCode::KeyS => self.movement.backward = is_pressed,
                KeyCode::KeyA => self.movement.left = is_pressed,
                KeyCode::KeyD => self.movement.right = is_pressed,
                KeyCode::KeyE => self.movement.up = is_pressed,
                KeyCode::KeyQ => self.movement.down = is_pressed,
                _ => {}
            }
        }
    }

    /// Drop any held movement keys, e.g. when camera control is toggled off
    /// while a key is down.
    pub fn reset_movement(&mut self) {
        self.movement = MovementState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_looks_down_the_tunnel() {
        let camera = Camera::new(16.0 / 9.0);
        let fwd = camera.forward();
        assert!(fwd.z < -0.99);
    }

    #[test]
    fn test_pitch_clamps_at_poles() {
        let mut camera = Camera::new(1.0);
        camera.rotate(0.0, 1.0e6);
        assert!(camera.pitch <= PITCH_LIMIT);
        camera.rotate(0.0, -2.0e6);
        assert!(camera.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn test_aspect_updates_projection() {
        let mut camera = Camera::new(1.0);
        let before = camera.view_proj();
        camera.set_aspect(2.0);
        assert_ne!(before, camera.view_proj());
        // Degenerate aspects are ignored.
        camera.set_aspect(0.0);
        let kept = camera.view_proj();
        camera.set_aspect(f32::NAN);
        assert_eq!(kept, camera.view_proj());
    }

    #[test]
    fn test_movement_integrates_delta() {
        let mut camera = Camera::new(1.0);
        let start = camera.position;
        camera.movement.forward = true;
        camera.update(0.1);
        let moved = (camera.position - start).length();
        assert!((moved - CAMERA_VELOCITY * 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_reset_movement_releases_keys() {
        let mut camera = Camera::new(1.0);
        camera.movement.forward = true;
        camera.reset_movement();
        let start = camera.position;
        camera.update(1.0);
        assert_eq!(camera.position, start);
    }
}
