//! Lightyear network protocol definition
//!
//! Messages only; no replicated components. Clients own their avatar's state and
//! report it, the server relays everyone's latest report back as world snapshots.

use bevy::prelude::*;
use lightyear::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::animation::AnimationName;
use crate::view::ViewMode;

/// Network-wide identifier of a connected player
pub type PlayerId = u64;

// --- Client -> Server ---

/// Full local avatar state, sent at [`STATE_REPORT_HZ`]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct PlayerStateReport {
    /// Client clock (ms) when the report was taken
    pub timestamp_ms: f64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub model_rotation_y: f32,
    pub pitch_rotation_x: f32,
    pub is_crouching: bool,
    pub height: f32,
    pub animation: AnimationName,
    pub view_mode: ViewMode,
}

/// One-shot action (jump, emote) to relay to the other players
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct PlayerAction {
    pub action_name: String,
}

// --- Server -> Client ---

/// Sent once after connecting
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Welcome {
    pub player_id: PlayerId,
    pub spawn_position: Vec3,
}

/// Another player performed a one-shot action
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct ActionBroadcast {
    pub player_id: PlayerId,
    pub action_name: String,
}

/// Another player disconnected
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct PlayerLeft {
    pub player_id: PlayerId,
    /// Server clock at the leave; snapshots stamped at or before it are stale for this player
    pub timestamp_ms: f64,
}

/// Latest known state of one remote player
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct RemotePlayerState {
    pub player_id: PlayerId,
    pub timestamp_ms: f64,
    pub position: Vec3,
    pub model_rotation_y: f32,
    pub height: f32,
    pub is_crouching: bool,
    pub animation: Option<AnimationName>,
    pub action_name: Option<String>,
}

/// Every player's latest state, broadcast at [`SNAPSHOT_HZ`]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct WorldSnapshot {
    /// Server clock (ms) when the snapshot was taken
    pub timestamp_ms: f64,
    pub players: Vec<RemotePlayerState>,
}

// --- Channels ---
// In Lightyear 0.25, Channel trait is auto-implemented for all Send + Sync + 'static types

/// Reliable channel for welcome, actions and leave notices
pub struct ReliableChannel;

/// Unreliable channel for state reports (lowest latency)
pub struct InputChannel;

/// Unreliable, unordered channel for world snapshots; receivers must tolerate loss and reordering
pub struct SnapshotChannel;

// --- Protocol Plugin ---

pub struct ProtocolPlugin;

impl Plugin for ProtocolPlugin {
    fn build(&self, app: &mut App) {
        // Client -> Server
        app.register_message::<PlayerStateReport>()
            .add_direction(NetworkDirection::ClientToServer);
        app.register_message::<PlayerAction>()
            .add_direction(NetworkDirection::ClientToServer);

        // Server -> Client
        app.register_message::<Welcome>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<ActionBroadcast>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<PlayerLeft>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<WorldSnapshot>()
            .add_direction(NetworkDirection::ServerToClient);

        app.add_channel::<ReliableChannel>(ChannelSettings {
            mode: ChannelMode::OrderedReliable(ReliableSettings::default()),
            ..default()
        })
        .add_direction(NetworkDirection::Bidirectional);

        app.add_channel::<InputChannel>(ChannelSettings {
            mode: ChannelMode::UnorderedUnreliable,
            ..default()
        })
        .add_direction(NetworkDirection::ClientToServer);

        app.add_channel::<SnapshotChannel>(ChannelSettings {
            mode: ChannelMode::UnorderedUnreliable,
            ..default()
        })
        .add_direction(NetworkDirection::ServerToClient);
    }
}

// --- Network Configuration ---

pub const SERVER_PORT: u16 = 5000;
pub const SERVER_ADDR: &str = "127.0.0.1";
pub const PROTOCOL_ID: u64 = 0x6772_6f76_6500_0001;

/// Address the server binds to
pub fn get_server_bind_addr() -> &'static str {
    "0.0.0.0"
}

/// Shared private key for local development
pub const PRIVATE_KEY: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
    0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
];

/// Fixed timestep for lightyear (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// World snapshot broadcast rate
pub const SNAPSHOT_HZ: f64 = 20.0;

/// Client state report rate
pub const STATE_REPORT_HZ: f64 = 20.0;

/// Tick duration for lightyear plugins
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}

pub fn snapshot_interval() -> Duration {
    Duration::from_secs_f64(1.0 / SNAPSHOT_HZ)
}

pub fn state_report_interval() -> Duration {
    Duration::from_secs_f64(1.0 / STATE_REPORT_HZ)
}
