//! Per-avatar state shared by the local and remote simulations
//!
//! Position convention: `position` tracks the TOP of the avatar's body, so the
//! feet are at `position.y - height`. Snapping onto a surface at height `h`
//! sets `position.y = h + height`.

use bevy::prelude::*;
use std::f32::consts::{PI, TAU};

use crate::animation::AnimationState;
use crate::obstacles::BodyShape;
use crate::view::ViewMode;

/// Standing body height (meters)
pub const STANDING_HEIGHT: f32 = 1.8;
/// Crouched body height (meters)
pub const CROUCH_HEIGHT: f32 = 0.9;
/// Horizontal collision radius of an avatar
pub const AVATAR_RADIUS: f32 = 0.5;

/// Body height for a crouch flag
#[inline]
pub fn body_height(crouching: bool) -> f32 {
    if crouching {
        CROUCH_HEIGHT
    } else {
        STANDING_HEIGHT
    }
}

/// Wrap an angle difference into `[-π, π]`
pub fn wrap_angle(mut angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    angle %= TAU;
    if angle > PI {
        angle -= TAU;
    } else if angle < -PI {
        angle += TAU;
    }
    angle
}

/// Shortest-path angular interpolation. The result never turns more than π from `start`.
pub fn lerp_angle(start: f32, end: f32, t: f32) -> f32 {
    start + wrap_angle(end - start) * t
}

/// Full state of one avatar.
///
/// `pitch`, `velocity` and `view_mode` are only meaningful for the local avatar;
/// remote avatars leave them at their defaults.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct AvatarState {
    pub position: Vec3,
    /// Facing angle about +Y; 0 faces +Z
    pub model_rotation_y: f32,
    pub pitch: f32,
    pub height: f32,
    pub is_crouching: bool,
    pub velocity: Vec3,
    pub animation: AnimationState,
    pub view_mode: ViewMode,
    /// Timestamp (ms) of the last authoritative update, if any arrived yet
    pub last_update_ms: Option<f64>,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

impl AvatarState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            model_rotation_y: 0.0,
            pitch: 0.0,
            height: STANDING_HEIGHT,
            is_crouching: false,
            velocity: Vec3::ZERO,
            animation: AnimationState::default(),
            view_mode: ViewMode::default(),
            last_update_ms: None,
        }
    }

    /// Y of the avatar's feet
    #[inline]
    pub fn feet_y(&self) -> f32 {
        self.position.y - self.height
    }

    /// Collision cylinder for the current height
    #[inline]
    pub fn body(&self) -> BodyShape {
        BodyShape {
            radius: AVATAR_RADIUS,
            height: self.height,
        }
    }

    /// Where a renderer should place the model root (at the feet)
    pub fn model_translation(&self) -> Vec3 {
        Vec3::new(self.position.x, self.feet_y(), self.position.z)
    }

    pub fn model_rotation(&self) -> Quat {
        Quat::from_rotation_y(self.model_rotation_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_angle_takes_short_way_across_pi() {
        let mid = lerp_angle(3.0, -3.0, 0.5);
        assert!((mid.abs() - PI).abs() < 1e-3, "got {mid}");
    }

    #[test]
    fn test_lerp_angle_never_turns_more_than_pi() {
        for &(a, b) in &[(0.0, 6.0), (-3.1, 3.1), (10.0, -10.0), (1.0, 1.0 + TAU)] {
            let end = lerp_angle(a, b, 1.0);
            assert!((end - a).abs() <= PI + 1e-4);
        }
    }

    #[test]
    fn test_wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-4 || (wrap_angle(3.0 * PI) + PI).abs() < 1e-4);
        assert_eq!(wrap_angle(0.5), 0.5);
        assert_eq!(wrap_angle(f32::NAN), 0.0);
    }

    #[test]
    fn test_feet_follow_height() {
        let mut state = AvatarState::at(Vec3::new(0.0, 3.8, 0.0));
        assert!((state.feet_y() - 2.0).abs() < 1e-6);
        state.height = CROUCH_HEIGHT;
        assert_eq!(state.body().height, CROUCH_HEIGHT);
        assert_eq!(state.model_translation().y, state.feet_y());
    }
}
