//! Look and view state for the locally controlled avatar
//!
//! First person: the mouse drives yaw and pitch directly and the avatar faces
//! away from the camera's yaw basis (`yaw - π`).
//! Third person: the mouse orbits the camera around the avatar; movement is
//! relative to the camera and the avatar turns toward where it walks.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Radians per pixel of mouse motion
pub const MOUSE_SENSITIVITY: f32 = 0.002;

/// Eye height above the feet (meters)
pub const EYE_HEIGHT: f32 = 1.7;
pub const CROUCH_EYE_HEIGHT: f32 = 0.8;
/// Exponential approach rate of the eye height toward its target (1/s)
pub const EYE_HEIGHT_RATE: f32 = 8.0;
/// Snap distance for eye height and remote body height smoothing
pub const HEIGHT_SNAP_EPSILON: f32 = 0.01;

pub const DEFAULT_ZOOM_DISTANCE: f32 = 12.0;
pub const MIN_ZOOM_DISTANCE: f32 = 3.0;
pub const MAX_ZOOM_DISTANCE: f32 = 20.0;
/// Distance per unit of wheel delta
pub const ZOOM_STEP: f32 = 0.01 * 0.5;
/// Camera rises 0.4 m per meter of orbit distance
const ORBIT_RISE: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ViewMode {
    #[default]
    FirstPerson,
    ThirdPerson,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::FirstPerson => ViewMode::ThirdPerson,
            ViewMode::ThirdPerson => ViewMode::FirstPerson,
        }
    }
}

/// Move `current` toward `target` at `rate` per second; snaps once within epsilon.
/// A frame never covers more than the remaining gap.
pub fn approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    if (current - target).abs() > HEIGHT_SNAP_EPSILON {
        current + (target - current) * (rate * dt).min(1.0)
    } else {
        target
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookState {
    /// First-person yaw about +Y
    pub yaw: f32,
    /// First-person pitch, within ±π/2
    pub pitch: f32,
    /// Third-person orbit angle of the camera around the avatar
    pub orbit_angle: f32,
    pub zoom_distance: f32,
    /// Smoothed eye height above the feet
    pub eye_height: f32,
}

impl Default for LookState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            orbit_angle: 0.0,
            zoom_distance: DEFAULT_ZOOM_DISTANCE,
            eye_height: EYE_HEIGHT,
        }
    }
}

impl LookState {
    /// Apply a mouse delta in pixels
    pub fn apply_mouse_motion(&mut self, mode: ViewMode, delta: Vec2) {
        match mode {
            ViewMode::FirstPerson => {
                self.yaw -= delta.x * MOUSE_SENSITIVITY;
                self.pitch = (self.pitch - delta.y * MOUSE_SENSITIVITY).max(-FRAC_PI_2).min(FRAC_PI_2);
            }
            ViewMode::ThirdPerson => {
                self.orbit_angle -= delta.x * MOUSE_SENSITIVITY;
            }
        }
    }

    /// Mouse wheel zoom; only third person has a distance to change
    pub fn apply_zoom(&mut self, mode: ViewMode, wheel_delta: f32) {
        if mode == ViewMode::ThirdPerson {
            self.zoom_distance = (self.zoom_distance + wheel_delta * ZOOM_STEP)
                .max(MIN_ZOOM_DISTANCE)
                .min(MAX_ZOOM_DISTANCE);
        }
    }

    /// Switch view modes, carrying the horizontal look direction across
    pub fn toggle_view_mode(&mut self, mode: ViewMode) -> ViewMode {
        match mode {
            ViewMode::FirstPerson => self.orbit_angle = self.yaw,
            ViewMode::ThirdPerson => self.yaw = self.orbit_angle,
        }
        mode.toggled()
    }

    pub fn update_eye_height(&mut self, crouching: bool, dt: f32) {
        let target = if crouching { CROUCH_EYE_HEIGHT } else { EYE_HEIGHT };
        self.eye_height = approach(self.eye_height, target, EYE_HEIGHT_RATE, dt);
    }

    /// Avatar facing while in first person
    pub fn first_person_facing(&self) -> f32 {
        self.yaw - PI
    }

    /// Horizontal unit vector the camera looks along
    pub fn camera_forward(&self, mode: ViewMode) -> Vec3 {
        let angle = match mode {
            ViewMode::FirstPerson => self.yaw,
            ViewMode::ThirdPerson => self.orbit_angle,
        };
        Vec3::new(-angle.sin(), 0.0, -angle.cos())
    }

    /// Horizontal unit vector to the camera's right (forward × up)
    pub fn camera_right(&self, mode: ViewMode) -> Vec3 {
        self.camera_forward(mode).cross(Vec3::Y)
    }

    /// First-person camera pose for an avatar whose feet are at `feet`
    pub fn first_person_camera(&self, feet: Vec3) -> (Vec3, Quat) {
        let eye = feet + Vec3::Y * self.eye_height;
        (eye, Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0))
    }

    /// Desired third-person camera position and look-at point.
    ///
    /// `anchor` is where the avatar model stands (its feet).
    pub fn third_person_camera_target(&self, anchor: Vec3, crouching: bool) -> (Vec3, Vec3) {
        let offset = Quat::from_rotation_y(self.orbit_angle)
            * Vec3::new(0.0, self.zoom_distance * ORBIT_RISE, self.zoom_distance);
        let mut look_at = anchor;
        look_at.y += if crouching { CROUCH_EYE_HEIGHT + 0.5 } else { EYE_HEIGHT - 0.2 };
        (anchor + offset, look_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut look = LookState::default();
        look.apply_mouse_motion(ViewMode::FirstPerson, Vec2::new(0.0, -10_000.0));
        assert_eq!(look.pitch, FRAC_PI_2);
        look.apply_mouse_motion(ViewMode::FirstPerson, Vec2::new(0.0, 20_000.0));
        assert_eq!(look.pitch, -FRAC_PI_2);
    }

    #[test]
    fn test_third_person_motion_orbits_only() {
        let mut look = LookState::default();
        look.apply_mouse_motion(ViewMode::ThirdPerson, Vec2::new(100.0, 50.0));
        assert_eq!(look.yaw, 0.0);
        assert_eq!(look.pitch, 0.0);
        assert!((look.orbit_angle + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_is_clamped_and_third_person_only() {
        let mut look = LookState::default();
        look.apply_zoom(ViewMode::FirstPerson, 500.0);
        assert_eq!(look.zoom_distance, DEFAULT_ZOOM_DISTANCE);
        look.apply_zoom(ViewMode::ThirdPerson, 100.0);
        assert!((look.zoom_distance - 12.5).abs() < 1e-5);
        look.apply_zoom(ViewMode::ThirdPerson, 100_000.0);
        assert_eq!(look.zoom_distance, MAX_ZOOM_DISTANCE);
        look.apply_zoom(ViewMode::ThirdPerson, -100_000.0);
        assert_eq!(look.zoom_distance, MIN_ZOOM_DISTANCE);
    }

    #[test]
    fn test_toggle_carries_look_direction() {
        let mut look = LookState { yaw: 1.25, ..default() };
        let mode = look.toggle_view_mode(ViewMode::FirstPerson);
        assert_eq!(mode, ViewMode::ThirdPerson);
        assert_eq!(look.orbit_angle, 1.25);

        look.orbit_angle = -0.5;
        let mode = look.toggle_view_mode(mode);
        assert_eq!(mode, ViewMode::FirstPerson);
        assert_eq!(look.yaw, -0.5);
    }

    #[test]
    fn test_camera_basis() {
        let look = LookState::default();
        assert!(close(look.camera_forward(ViewMode::ThirdPerson), Vec3::NEG_Z));
        assert!(close(look.camera_right(ViewMode::ThirdPerson), Vec3::X));

        let turned = LookState { orbit_angle: FRAC_PI_2, ..default() };
        assert!(close(turned.camera_forward(ViewMode::ThirdPerson), Vec3::NEG_X));
        assert!(close(turned.camera_right(ViewMode::ThirdPerson), Vec3::NEG_Z));
    }

    #[test]
    fn test_camera_sits_behind_and_above() {
        let look = LookState::default();
        let (cam, target) = look.third_person_camera_target(Vec3::new(0.0, 1.8, 0.0), false);
        assert!(close(cam, Vec3::new(0.0, 1.8 + 4.8, 12.0)));
        assert!(close(target, Vec3::new(0.0, 3.3, 0.0)));
        // looking along camera forward
        let dir = (target - cam).with_y(0.0).normalize();
        assert!(close(dir, look.camera_forward(ViewMode::ThirdPerson)));
    }

    #[test]
    fn test_eye_height_converges_without_overshoot() {
        let mut look = LookState::default();
        let mut last = look.eye_height;
        for _ in 0..200 {
            look.update_eye_height(true, 1.0 / 60.0);
            assert!(look.eye_height <= last);
            assert!(look.eye_height >= CROUCH_EYE_HEIGHT);
            last = look.eye_height;
        }
        assert_eq!(look.eye_height, CROUCH_EYE_HEIGHT);
    }

    #[test]
    fn test_long_frames_do_not_overshoot() {
        let mut look = LookState::default();
        for _ in 0..10 {
            look.update_eye_height(true, 0.25);
            let h = look.eye_height;
            assert!(h >= CROUCH_EYE_HEIGHT - 1e-5 && h <= EYE_HEIGHT + 1e-5, "eye height {h}");
        }
        assert_eq!(look.eye_height, CROUCH_EYE_HEIGHT);

        // rate * dt well past 1 lands exactly on the target
        assert!((approach(1.8, 0.9, 8.0, 0.3) - 0.9).abs() < 1e-5);
        assert!((approach(0.9, 1.8, 8.0, 1.0) - 1.8).abs() < 1e-5);
    }
}
