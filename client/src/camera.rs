//! First-person and third-person camera system
//!
//! Updated for Bevy 0.17

use bevy::prelude::*;
use shared::{LocalAvatar, ViewMode};

/// Exponential follow rate of the third-person camera (1/s)
const THIRD_PERSON_FOLLOW_RATE: f32 = 10.0;

/// Frame the camera from the local avatar's look state
pub fn update_camera(
    avatar: Res<LocalAvatar>,
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };

    let feet = avatar.state.model_translation();
    match avatar.state.view_mode {
        ViewMode::FirstPerson => {
            let (eye, rotation) = avatar.look.first_person_camera(feet);
            camera_transform.translation = eye;
            camera_transform.rotation = rotation;
        }
        ViewMode::ThirdPerson => {
            let (target_pos, look_at) = avatar
                .look
                .third_person_camera_target(feet, avatar.state.is_crouching);
            let t = 1.0_f32 - (-THIRD_PERSON_FOLLOW_RATE * time.delta_secs()).exp();
            camera_transform.translation = camera_transform.translation.lerp(target_pos, t);
            camera_transform.look_at(look_at, Vec3::Y);
        }
    }
}
