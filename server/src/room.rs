//! Relay room: the latest reported state of every connected player
//!
//! The server does not simulate avatars. It keeps each peer's last report,
//! clamps it to the playable area, and hands out snapshots of everyone.

use bevy::prelude::*;
use rand::Rng;
use std::collections::HashMap;

use shared::{
    AnimationName, PlayerId, PlayerStateReport, RemotePlayerState, WorldSnapshot, STANDING_HEIGHT,
};

/// Reported positions are clamped to ±this on X and Z
pub const WORLD_BOUNDARY: f32 = 240.0;
/// Lowest allowed feet height; positions below `FLOOR_Y + height` are lifted
pub const FLOOR_Y: f32 = -10.0;
/// New players spawn within ±this of the origin on X and Z
pub const SPAWN_SPREAD: f32 = 10.0;
/// Spawn height; clients drop onto the ground from here
pub const SPAWN_HEIGHT: f32 = 5.0;

#[derive(Resource, Default, Debug)]
pub struct Room {
    players: HashMap<PlayerId, RemotePlayerState>,
}

impl Room {
    /// Register a player and pick its spawn position
    pub fn join(&mut self, player_id: PlayerId, rng: &mut impl Rng) -> Vec3 {
        let spawn = Vec3::new(
            rng.gen_range(-SPAWN_SPREAD..=SPAWN_SPREAD),
            SPAWN_HEIGHT,
            rng.gen_range(-SPAWN_SPREAD..=SPAWN_SPREAD),
        );
        self.players.insert(
            player_id,
            RemotePlayerState {
                player_id,
                timestamp_ms: 0.0,
                position: spawn,
                model_rotation_y: 0.0,
                height: STANDING_HEIGHT,
                is_crouching: false,
                animation: Some(AnimationName::Idle),
                action_name: None,
            },
        );
        info!("Player {player_id} joined at {spawn:?} ({} in room)", self.players.len());
        spawn
    }

    /// Store a state report. Returns false for unknown players.
    pub fn apply_report(&mut self, player_id: PlayerId, report: &PlayerStateReport) -> bool {
        let Some(state) = self.players.get_mut(&player_id) else {
            return false;
        };
        state.timestamp_ms = report.timestamp_ms;
        state.position = report.position;
        state.model_rotation_y = report.model_rotation_y;
        state.height = report.height;
        state.is_crouching = report.is_crouching;
        state.animation = Some(report.animation);

        let p = &mut state.position;
        if !p.is_finite() {
            *p = Vec3::new(0.0, SPAWN_HEIGHT, 0.0);
        }
        p.x = p.x.max(-WORLD_BOUNDARY).min(WORLD_BOUNDARY);
        p.z = p.z.max(-WORLD_BOUNDARY).min(WORLD_BOUNDARY);
        p.y = p.y.max(FLOOR_Y + report.height);
        true
    }

    /// Latch a one-shot action into the next snapshot. A jump also becomes the
    /// stored animation.
    pub fn record_action(&mut self, player_id: PlayerId, action_name: &str) -> bool {
        let Some(state) = self.players.get_mut(&player_id) else {
            return false;
        };
        if action_name == AnimationName::Jump.wire_name() {
            state.animation = Some(AnimationName::Jump);
        }
        state.action_name = Some(action_name.to_string());
        true
    }

    pub fn leave(&mut self, player_id: PlayerId) -> bool {
        let removed = self.players.remove(&player_id).is_some();
        if removed {
            info!("Player {player_id} left ({} in room)", self.players.len());
        }
        removed
    }

    /// Everyone's latest state, ordered by id. Latched actions are sent once.
    pub fn snapshot(&mut self, now_ms: f64) -> WorldSnapshot {
        let mut players: Vec<RemotePlayerState> = self
            .players
            .values_mut()
            .map(|state| {
                let out = state.clone();
                state.action_name = None;
                out
            })
            .collect();
        players.sort_unstable_by_key(|p| p.player_id);
        WorldSnapshot {
            timestamp_ms: now_ms,
            players,
        }
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&RemotePlayerState> {
        self.players.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::ViewMode;

    fn report(position: Vec3) -> PlayerStateReport {
        PlayerStateReport {
            timestamp_ms: 42.0,
            position,
            velocity: Vec3::ZERO,
            model_rotation_y: 1.0,
            pitch_rotation_x: 0.0,
            is_crouching: false,
            height: STANDING_HEIGHT,
            animation: AnimationName::Running,
            view_mode: ViewMode::ThirdPerson,
        }
    }

    #[test]
    fn test_join_spawns_near_origin() {
        let mut room = Room::default();
        let mut rng = StdRng::seed_from_u64(1);
        for id in 0..50 {
            let spawn = room.join(id, &mut rng);
            assert!(spawn.x.abs() <= SPAWN_SPREAD && spawn.z.abs() <= SPAWN_SPREAD);
            assert_eq!(spawn.y, SPAWN_HEIGHT);
        }
        assert_eq!(room.len(), 50);
    }

    #[test]
    fn test_report_is_clamped() {
        let mut room = Room::default();
        room.join(7, &mut StdRng::seed_from_u64(2));

        assert!(room.apply_report(7, &report(Vec3::new(500.0, -100.0, -300.0))));
        let state = room.get(7).unwrap();
        assert_eq!(state.position, Vec3::new(WORLD_BOUNDARY, FLOOR_Y + STANDING_HEIGHT, -WORLD_BOUNDARY));
        assert_eq!(state.animation, Some(AnimationName::Running));
        assert_eq!(state.timestamp_ms, 42.0);

        assert!(room.apply_report(7, &report(Vec3::new(3.0, 4.0, 5.0))));
        assert_eq!(room.get(7).unwrap().position, Vec3::new(3.0, 4.0, 5.0));
    }

    #[test]
    fn test_unknown_player_is_ignored() {
        let mut room = Room::default();
        assert!(!room.apply_report(1, &report(Vec3::ZERO)));
        assert!(!room.record_action(1, "Wave"));
        assert!(!room.leave(1));
    }

    #[test]
    fn test_actions_are_latched_once() {
        let mut room = Room::default();
        room.join(3, &mut StdRng::seed_from_u64(3));
        assert!(room.record_action(3, "Jump"));

        let first = room.snapshot(100.0);
        assert_eq!(first.players[0].action_name.as_deref(), Some("Jump"));
        assert_eq!(first.players[0].animation, Some(AnimationName::Jump));

        let second = room.snapshot(150.0);
        assert_eq!(second.players[0].action_name, None);
        assert_eq!(second.timestamp_ms, 150.0);
    }

    #[test]
    fn test_snapshot_lists_everyone_in_id_order() {
        let mut room = Room::default();
        let mut rng = StdRng::seed_from_u64(4);
        for id in [9, 2, 5] {
            room.join(id, &mut rng);
        }
        room.leave(5);
        let ids: Vec<_> = room.snapshot(0.0).players.iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![2, 9]);
    }
}
