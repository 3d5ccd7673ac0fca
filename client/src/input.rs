//! Player input handling
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use lightyear::prelude::*;
use shared::{AnimationName, InputFlags, LocalAvatar, PlayerAction, ReliableChannel};

/// Wheel "lines" are converted to pixel-sized deltas before zooming
const PIXELS_PER_WHEEL_LINE: f32 = 100.0;

/// Emote hotkeys
const EMOTE_KEYS: [(KeyCode, AnimationName); 5] = [
    (KeyCode::KeyY, AnimationName::Yes),
    (KeyCode::KeyN, AnimationName::No),
    (KeyCode::KeyG, AnimationName::Wave),
    (KeyCode::KeyP, AnimationName::Punch),
    (KeyCode::KeyX, AnimationName::Death),
];

/// Client-side input state
#[derive(Resource, Default)]
pub struct ClientInput {
    pub flags: InputFlags,
}

/// Handle keyboard input for movement
pub fn handle_keyboard_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut input: ResMut<ClientInput>,
    mut avatar: ResMut<LocalAvatar>,
) {
    let any = |keys: &[KeyCode]| keys.iter().any(|k| keyboard.pressed(*k));
    input.flags = InputFlags {
        forward: any(&[KeyCode::KeyW, KeyCode::ArrowUp]),
        backward: any(&[KeyCode::KeyS, KeyCode::ArrowDown]),
        left: any(&[KeyCode::KeyA, KeyCode::ArrowLeft]),
        right: any(&[KeyCode::KeyD, KeyCode::ArrowRight]),
        jump: keyboard.pressed(KeyCode::Space),
        crouch: any(&[KeyCode::ShiftLeft, KeyCode::ShiftRight]),
    };

    if keyboard.just_pressed(KeyCode::KeyV) {
        let mode = avatar.toggle_view_mode();
        info!("View mode: {:?}", mode);
    }
}

/// Emote keys start a one-shot locally and tell the server about it
pub fn handle_emote_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut avatar: ResMut<LocalAvatar>,
    mut client_query: Query<&mut MessageSender<PlayerAction>, (With<crate::GameClient>, With<Connected>)>,
) {
    for (key, emote) in EMOTE_KEYS {
        if !keyboard.just_pressed(key) || !avatar.play_emote(emote) {
            continue;
        }
        debug!("Playing emote {}", emote);
        if let Ok(mut sender) = client_query.single_mut() {
            sender.send::<ReliableChannel>(PlayerAction {
                action_name: emote.wire_name().to_string(),
            });
        }
    }
}

/// Handle mouse input for looking around and zooming
pub fn handle_mouse_input(
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mut avatar: ResMut<LocalAvatar>,
) {
    let mut delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        delta += motion.delta;
    }
    if delta != Vec2::ZERO {
        avatar.apply_mouse_motion(delta);
    }

    let mut wheel = 0.0;
    for event in mouse_wheel.read() {
        let pixels = match event.unit {
            MouseScrollUnit::Line => event.y * PIXELS_PER_WHEEL_LINE,
            MouseScrollUnit::Pixel => event.y,
        };
        // Scrolling up pulls the camera in
        wheel -= pixels;
    }
    if wheel != 0.0 {
        avatar.apply_zoom(wheel);
    }
}
