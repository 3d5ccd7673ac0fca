//! Remote avatar snapshot interpolation
//!
//! Each remote avatar keeps a small ring of the snapshots it received and is
//! rendered [`INTERPOLATION_DELAY_MS`] in the past, blending the two snapshots that
//! bracket the render time.
//!
//! Snapshots are appended in arrival order and never sorted. The snapshot
//! channel is unordered, so a late packet can land after a newer one; the scan
//! below then simply finds an older "lower" entry, which keeps rendering stable.

use bevy::prelude::*;
use std::collections::{HashMap, VecDeque};

use crate::animation::AnimationName;
use crate::avatar::{body_height, lerp_angle, AvatarState};
use crate::protocol::{PlayerId, RemotePlayerState, WorldSnapshot};
use crate::view::approach;

/// How far behind the newest data remote avatars are rendered
pub const INTERPOLATION_DELAY_MS: f64 = 100.0;
/// Snapshots kept per remote avatar
pub const SNAPSHOT_BUFFER_CAPACITY: usize = 20;
/// Rate at which the displayed height approaches its crouch target (1/s)
pub const REMOTE_HEIGHT_RATE: f32 = 8.0;

/// One received state of a remote avatar. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp_ms: f64,
    pub position: Vec3,
    pub model_rotation_y: f32,
    pub height: f32,
    pub is_crouching: bool,
    pub animation: Option<AnimationName>,
    pub action_name: Option<String>,
}

impl Snapshot {
    /// Build from a network state, stamped with the time it was received locally
    pub fn from_remote(state: &RemotePlayerState, received_at_ms: f64) -> Self {
        Self {
            timestamp_ms: received_at_ms,
            position: state.position,
            model_rotation_y: state.model_rotation_y,
            height: state.height,
            is_crouching: state.is_crouching,
            animation: state.animation,
            action_name: state.action_name.clone(),
        }
    }
}

/// Fixed-capacity FIFO of snapshots in arrival order
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::with_capacity(SNAPSHOT_BUFFER_CAPACITY)
    }
}

impl SnapshotBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.entries.get(index)
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    /// The pair of snapshots to blend for `render_ts`.
    ///
    /// Scans newest to oldest for the first entry not after `render_ts`; its
    /// successor (or itself, if newest) is the upper bound. With nothing old
    /// enough both bounds are the oldest entry.
    pub fn bracket(&self, render_ts: f64) -> Option<(&Snapshot, &Snapshot)> {
        let lower = (0..self.entries.len())
            .rev()
            .find(|&i| self.entries[i].timestamp_ms <= render_ts);
        match lower {
            Some(i) => {
                let upper = self.entries.get(i + 1).unwrap_or(&self.entries[i]);
                Some((&self.entries[i], upper))
            }
            None => self.oldest().map(|oldest| (oldest, oldest)),
        }
    }
}

/// Blended pose at a render time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPose {
    pub position: Vec3,
    pub model_rotation_y: f32,
    pub is_crouching: bool,
}

/// Snapshot buffer plus the displayed state of one remote avatar
#[derive(Debug, Clone)]
pub struct SnapshotInterpolator {
    buffer: SnapshotBuffer,
    state: AvatarState,
    delay_ms: f64,
}

impl SnapshotInterpolator {
    /// An interpolator with nothing buffered; `update` leaves its state alone until a push
    pub fn empty(delay_ms: f64) -> Self {
        Self {
            buffer: SnapshotBuffer::default(),
            state: AvatarState::default(),
            delay_ms,
        }
    }

    /// Start from a first snapshot, shown immediately
    pub fn new(initial: Snapshot, delay_ms: f64) -> Self {
        let mut interpolator = Self::empty(delay_ms);
        let state = &mut interpolator.state;
        state.position = initial.position;
        state.model_rotation_y = initial.model_rotation_y;
        state.height = initial.height;
        state.is_crouching = initial.is_crouching;
        interpolator.push(initial);
        interpolator
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    /// Displayed state
    pub fn state(&self) -> &AvatarState {
        &self.state
    }

    /// Buffer a snapshot. Animation changes it carries apply right away.
    ///
    /// An action already playing (typically started by the reliable action
    /// broadcast) is not restarted.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.state.last_update_ms = Some(snapshot.timestamp_ms);
        self.apply_base_animation(snapshot.animation, snapshot.is_crouching);
        if let Some(action) = snapshot.action_name.as_deref() {
            let playing = self.state.animation.is_playing_one_shot()
                && AnimationName::from_wire(action) == Some(self.state.animation.current());
            if !playing {
                self.apply_action(action);
            }
        }
        self.buffer.push(snapshot);
    }

    fn apply_base_animation(&mut self, animation: Option<AnimationName>, crouching: bool) {
        let anim = &mut self.state.animation;
        if anim.is_playing_one_shot() {
            return;
        }
        match animation {
            Some(AnimationName::Jump) if anim.base != AnimationName::Jump => {
                // play the jump over whatever it lands into
                anim.play_one_shot(AnimationName::Jump);
                anim.set_base(AnimationName::grounded(false, crouching));
            }
            // one-shot clips never become the looping base
            Some(name) if name.is_one_shot() => {}
            Some(name) => {
                anim.set_base(name);
            }
            None => {
                anim.set_base(AnimationName::Idle);
            }
        }
    }

    /// Play a relayed one-shot action. Unknown or looping names are ignored.
    pub fn apply_action(&mut self, action_name: &str) -> bool {
        match AnimationName::from_wire(action_name) {
            Some(name) => self.state.animation.play_one_shot(name),
            None => {
                debug!("Ignoring unknown action {action_name:?}");
                false
            }
        }
    }

    /// Pose at `render_ts`, or `None` with an empty buffer
    pub fn sample(&self, render_ts: f64) -> Option<InterpolatedPose> {
        let (lower, upper) = self.buffer.bracket(render_ts)?;
        let span = upper.timestamp_ms - lower.timestamp_ms;
        let t = if span != 0.0 {
            ((render_ts - lower.timestamp_ms) / span).max(0.0).min(1.0) as f32
        } else {
            0.0
        };
        Some(InterpolatedPose {
            position: lower.position.lerp(upper.position, t),
            model_rotation_y: lerp_angle(lower.model_rotation_y, upper.model_rotation_y, t),
            is_crouching: lower.is_crouching,
        })
    }

    /// Move the displayed state to the delayed render time
    pub fn update(&mut self, now_ms: f64, dt: f32) {
        let Some(pose) = self.sample(now_ms - self.delay_ms) else {
            return;
        };
        self.state.position = pose.position;
        self.state.model_rotation_y = pose.model_rotation_y;
        self.state.is_crouching = pose.is_crouching;
        let target = body_height(pose.is_crouching);
        self.state.height = approach(self.state.height, target, REMOTE_HEIGHT_RATE, dt);
        self.state.animation.tick(dt);
    }
}

/// Every known remote avatar, keyed by player id
#[derive(Resource, Debug, Clone)]
pub struct RemoteRoster {
    players: HashMap<PlayerId, SnapshotInterpolator>,
    /// Server time each removed player left at
    departed: HashMap<PlayerId, f64>,
    delay_ms: f64,
}

impl Default for RemoteRoster {
    fn default() -> Self {
        Self::new(INTERPOLATION_DELAY_MS)
    }
}

impl RemoteRoster {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            players: HashMap::new(),
            departed: HashMap::new(),
            delay_ms,
        }
    }

    /// Feed a world snapshot, skipping the local player. Returns ids seen for the first time.
    ///
    /// Snapshots are unreliable and may arrive after the reliable leave notice, so
    /// a departed player is only admitted again by a snapshot stamped after it left.
    pub fn apply_world_snapshot(
        &mut self,
        snapshot: &WorldSnapshot,
        local_id: Option<PlayerId>,
        received_at_ms: f64,
    ) -> Vec<PlayerId> {
        let mut joined = Vec::new();
        for remote in &snapshot.players {
            if Some(remote.player_id) == local_id {
                continue;
            }
            if let Some(&left_at_ms) = self.departed.get(&remote.player_id) {
                if snapshot.timestamp_ms <= left_at_ms {
                    continue;
                }
                self.departed.remove(&remote.player_id);
            }
            let entry = Snapshot::from_remote(remote, received_at_ms);
            match self.players.get_mut(&remote.player_id) {
                Some(interpolator) => interpolator.push(entry),
                None => {
                    info!("Remote player {} joined at {:?}", remote.player_id, remote.position);
                    self.players
                        .insert(remote.player_id, SnapshotInterpolator::new(entry, self.delay_ms));
                    joined.push(remote.player_id);
                }
            }
        }
        joined
    }

    /// Relay a one-shot action to a known remote avatar
    pub fn apply_action(&mut self, player_id: PlayerId, action_name: &str) -> bool {
        match self.players.get_mut(&player_id) {
            Some(interpolator) => interpolator.apply_action(action_name),
            None => {
                debug!("Action {action_name:?} for unknown player {player_id}");
                false
            }
        }
    }

    /// Drop a player that left at server time `left_at_ms`
    pub fn remove(&mut self, player_id: PlayerId, left_at_ms: f64) -> Option<SnapshotInterpolator> {
        let left_at = self.departed.entry(player_id).or_insert(left_at_ms);
        *left_at = left_at.max(left_at_ms);
        let removed = self.players.remove(&player_id);
        if removed.is_some() {
            info!("Remote player {player_id} left");
        }
        removed
    }

    pub fn update_all(&mut self, now_ms: f64, dt: f32) {
        for interpolator in self.players.values_mut() {
            interpolator.update(now_ms, dt);
        }
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&SnapshotInterpolator> {
        self.players.get(&player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &SnapshotInterpolator)> {
        self.players.iter().map(|(id, interpolator)| (*id, interpolator))
    }

    /// Known ids in ascending order
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Forget every remote avatar, e.g. after losing the server
    pub fn clear(&mut self) {
        self.players.clear();
        self.departed.clear();
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
    use crate::avatar::{CROUCH_HEIGHT, STANDING_HEIGHT};
    use std::f32::consts::PI;

    fn snap(timestamp_ms: f64, position: Vec3) -> Snapshot {
        Snapshot {
            timestamp_ms,
            position,
            model_rotation_y: 0.0,
            height: STANDING_HEIGHT,
            is_crouching: false,
            animation: None,
            action_name: None,
        }
    }

    fn remote(player_id: PlayerId, position: Vec3) -> RemotePlayerState {
        RemotePlayerState {
            player_id,
            timestamp_ms: 0.0,
            position,
            model_rotation_y: 0.0,
            height: STANDING_HEIGHT,
            is_crouching: false,
            animation: Some(AnimationName::Idle),
            action_name: None,
        }
    }

    #[test]
    fn test_renders_between_bracketing_snapshots() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), INTERPOLATION_DELAY_MS);
        interp.push(snap(200.0, Vec3::new(2.0, 0.0, 0.0)));
        interp.update(250.0, 1.0 / 60.0);
        assert!((interp.state().position - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_single_snapshot_renders_exactly() {
        let interp = SnapshotInterpolator::new(snap(500.0, Vec3::new(3.0, 1.0, -2.0)), 100.0);
        for render_ts in [0.0, 500.0, 10_000.0] {
            let pose = interp.sample(render_ts).unwrap();
            assert_eq!(pose.position, Vec3::new(3.0, 1.0, -2.0));
            assert!(pose.model_rotation_y.is_finite());
        }
    }

    #[test]
    fn test_too_early_uses_oldest() {
        let mut interp = SnapshotInterpolator::new(snap(100.0, Vec3::X), 100.0);
        interp.push(snap(200.0, Vec3::Y));
        let pose = interp.sample(50.0).unwrap();
        assert_eq!(pose.position, Vec3::X);
    }

    #[test]
    fn test_past_newest_holds_newest() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::X), 100.0);
        interp.push(snap(50.0, Vec3::Z));
        let pose = interp.sample(1_000.0).unwrap();
        assert_eq!(pose.position, Vec3::Z);
    }

    #[test]
    fn test_facing_takes_short_way() {
        let mut a = snap(0.0, Vec3::ZERO);
        a.model_rotation_y = 3.0;
        let mut b = snap(100.0, Vec3::ZERO);
        b.model_rotation_y = -3.0;
        let mut interp = SnapshotInterpolator::new(a, 0.0);
        interp.push(b);
        let pose = interp.sample(50.0).unwrap();
        assert!((pose.model_rotation_y.abs() - PI).abs() < 1e-3);
    }

    #[test]
    fn test_empty_buffer_leaves_state_alone() {
        let mut interp = SnapshotInterpolator::empty(100.0);
        let before = interp.state().clone();
        interp.update(5_000.0, 0.1);
        assert!(interp.sample(0.0).is_none());
        assert_eq!(interp.state(), &before);
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = SnapshotBuffer::default();
        for i in 0..25 {
            buffer.push(snap(i as f64, Vec3::ZERO));
        }
        assert_eq!(buffer.len(), SNAPSHOT_BUFFER_CAPACITY);
        assert_eq!(buffer.oldest().unwrap().timestamp_ms, 5.0);
        assert_eq!(buffer.newest().unwrap().timestamp_ms, 24.0);
    }

    #[test]
    fn test_out_of_order_arrival_is_kept_in_arrival_order() {
        let mut buffer = SnapshotBuffer::default();
        buffer.push(snap(0.0, Vec3::ZERO));
        buffer.push(snap(200.0, Vec3::X));
        buffer.push(snap(100.0, Vec3::Y));
        assert_eq!(buffer.get(2).unwrap().timestamp_ms, 100.0);
        // newest-first scan finds the late packet and holds it
        let (lower, upper) = buffer.bracket(150.0).unwrap();
        assert_eq!(lower.timestamp_ms, 100.0);
        assert_eq!(upper.timestamp_ms, 100.0);
    }

    #[test]
    fn test_height_eases_toward_crouch() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 0.0);
        let mut crouched = snap(10.0, Vec3::ZERO);
        crouched.is_crouching = true;
        crouched.height = CROUCH_HEIGHT;
        interp.push(crouched);

        interp.update(20.0, 1.0 / 60.0);
        let h = interp.state().height;
        assert!(h < STANDING_HEIGHT && h > CROUCH_HEIGHT, "eased, got {h}");
        assert!(interp.state().is_crouching);

        for _ in 0..200 {
            interp.update(20.0, 1.0 / 60.0);
        }
        assert_eq!(interp.state().height, CROUCH_HEIGHT);
    }

    #[test]
    fn test_height_stays_in_range_on_long_frames() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 0.0);
        let mut crouched = snap(10.0, Vec3::ZERO);
        crouched.is_crouching = true;
        crouched.height = CROUCH_HEIGHT;
        interp.push(crouched);

        for dt in [0.25, 0.3, 0.25, 0.5] {
            interp.update(20.0, dt);
            let h = interp.state().height;
            assert!(
                h >= CROUCH_HEIGHT - 1e-5 && h <= STANDING_HEIGHT + 1e-5,
                "height {h} at dt {dt}"
            );
        }
        assert_eq!(interp.state().height, CROUCH_HEIGHT);
    }

    #[test]
    fn test_animation_applies_on_arrival() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 100.0);
        let mut running = snap(10.0, Vec3::ZERO);
        running.animation = Some(AnimationName::Running);
        interp.push(running);
        assert_eq!(interp.state().animation.current(), AnimationName::Running);

        let mut waving = snap(20.0, Vec3::ZERO);
        waving.action_name = Some("Wave".to_string());
        interp.push(waving);
        assert_eq!(interp.state().animation.current(), AnimationName::Wave);
        assert_eq!(interp.state().last_update_ms, Some(20.0));
    }

    #[test]
    fn test_latched_action_does_not_restart_clip() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 0.0);
        assert!(interp.apply_action("Wave"));
        interp.update(0.0, 1.5);

        let mut latched = snap(10.0, Vec3::ZERO);
        latched.action_name = Some("Wave".to_string());
        interp.push(latched);
        // 0.5 s left of the original 2 s clip
        interp.update(10.0, 0.6);
        assert_eq!(interp.state().animation.current(), AnimationName::Idle);
    }

    #[test]
    fn test_remote_jump_plays_once_over_landing() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 100.0);
        let mut jumping = snap(10.0, Vec3::ZERO);
        jumping.animation = Some(AnimationName::Jump);
        interp.push(jumping);
        assert_eq!(interp.state().animation.current(), AnimationName::Jump);
        assert_eq!(interp.state().animation.base, AnimationName::Idle);
    }

    #[test]
    fn test_roster_skips_local_and_tracks_joins() {
        let mut roster = RemoteRoster::default();
        let world = WorldSnapshot {
            timestamp_ms: 0.0,
            players: vec![remote(1, Vec3::ZERO), remote(2, Vec3::X), remote(3, Vec3::Y)],
        };
        let joined = roster.apply_world_snapshot(&world, Some(2), 1_000.0);
        assert_eq!(joined, vec![1, 3]);
        assert_eq!(roster.ids(), vec![1, 3]);

        let joined = roster.apply_world_snapshot(&world, Some(2), 1_050.0);
        assert!(joined.is_empty());
        assert_eq!(roster.get(1).unwrap().buffer().len(), 2);
        assert_eq!(roster.get(1).unwrap().buffer().newest().unwrap().timestamp_ms, 1_050.0);

        assert!(roster.apply_action(3, "Punch"));
        assert!(!roster.apply_action(9, "Punch"));
        assert!(!roster.apply_action(3, "Dance"));

        assert!(roster.remove(1, 0.0).is_some());
        assert!(roster.remove(1, 0.0).is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_roster_updates_every_avatar() {
        let mut roster = RemoteRoster::new(100.0);
        let first = WorldSnapshot { timestamp_ms: 0.0, players: vec![remote(7, Vec3::ZERO)] };
        let second = WorldSnapshot { timestamp_ms: 0.0, players: vec![remote(7, Vec3::new(4.0, 0.0, 0.0))] };
        roster.apply_world_snapshot(&first, None, 0.0);
        roster.apply_world_snapshot(&second, None, 200.0);
        roster.update_all(200.0, 0.016);
        let (_, interp) = roster.iter().next().unwrap();
        assert!((interp.state().position.x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_late_snapshot_does_not_bring_back_departed_player() {
        let mut roster = RemoteRoster::default();
        let before_leave = WorldSnapshot { timestamp_ms: 100.0, players: vec![remote(5, Vec3::ZERO)] };
        roster.apply_world_snapshot(&before_leave, None, 0.0);
        assert!(roster.remove(5, 150.0).is_some());

        // sent before the leave, delivered after it
        let late = WorldSnapshot { timestamp_ms: 120.0, players: vec![remote(5, Vec3::X)] };
        assert!(roster.apply_world_snapshot(&late, None, 60.0).is_empty());
        assert!(roster.get(5).is_none());

        // a snapshot stamped after the leave is a rejoin
        let rejoined = WorldSnapshot { timestamp_ms: 300.0, players: vec![remote(5, Vec3::Y)] };
        assert_eq!(roster.apply_world_snapshot(&rejoined, None, 120.0), vec![5]);
        assert_eq!(roster.get(5).unwrap().state().position, Vec3::Y);
    }

    #[test]
    fn test_snapshot_one_shot_name_does_not_become_base() {
        let mut interp = SnapshotInterpolator::new(snap(0.0, Vec3::ZERO), 100.0);
        let mut waving = snap(10.0, Vec3::ZERO);
        waving.animation = Some(AnimationName::Wave);
        interp.push(waving);
        assert_eq!(interp.state().animation.base, AnimationName::Idle);
        assert!(!interp.state().animation.is_playing_one_shot());

        let mut walking = snap(20.0, Vec3::ZERO);
        walking.animation = Some(AnimationName::Walking);
        interp.push(walking);
        assert_eq!(interp.state().animation.current(), AnimationName::Walking);
    }
}
