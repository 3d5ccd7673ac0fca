//! Animation state machine: a looping base animation plus at most one one-shot
//! played over it.
//!
//! A one-shot either runs for a known duration (counted down by [`AnimationState::tick`])
//! or until the presentation layer reports the clip finished
//! ([`AnimationState::finish_one_shot`]). While one is playing, base changes are
//! recorded but not shown.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnimationName {
    #[default]
    Idle,
    Walking,
    Running,
    Jump,
    Sitting,
    Dance,
    Death,
    Standing,
    Yes,
    No,
    Wave,
    Punch,
    ThumbsUp,
}

impl AnimationName {
    pub const ALL: [AnimationName; 13] = [
        AnimationName::Idle,
        AnimationName::Walking,
        AnimationName::Running,
        AnimationName::Jump,
        AnimationName::Sitting,
        AnimationName::Dance,
        AnimationName::Death,
        AnimationName::Standing,
        AnimationName::Yes,
        AnimationName::No,
        AnimationName::Wave,
        AnimationName::Punch,
        AnimationName::ThumbsUp,
    ];

    /// Name used on the wire and for clip lookup
    pub fn wire_name(self) -> &'static str {
        match self {
            AnimationName::Idle => "Idle",
            AnimationName::Walking => "Walking",
            AnimationName::Running => "Running",
            AnimationName::Jump => "Jump",
            AnimationName::Sitting => "Sitting",
            AnimationName::Dance => "Dance",
            AnimationName::Death => "Death",
            AnimationName::Standing => "Standing",
            AnimationName::Yes => "Yes",
            AnimationName::No => "No",
            AnimationName::Wave => "Wave",
            AnimationName::Punch => "Punch",
            AnimationName::ThumbsUp => "ThumbsUp",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.wire_name() == name)
    }

    /// Plays once over the base animation instead of looping
    pub fn is_one_shot(self) -> bool {
        matches!(
            self,
            AnimationName::Jump
                | AnimationName::Death
                | AnimationName::Standing
                | AnimationName::Yes
                | AnimationName::No
                | AnimationName::Wave
                | AnimationName::Punch
                | AnimationName::ThumbsUp
        )
    }

    /// Clip length in seconds for one-shots; `None` for looping animations
    pub fn nominal_duration(self) -> Option<f32> {
        match self {
            AnimationName::Jump => Some(1.0),
            AnimationName::Death => Some(2.5),
            AnimationName::Standing => Some(1.2),
            AnimationName::Yes | AnimationName::No => Some(1.5),
            AnimationName::Wave => Some(2.0),
            AnimationName::Punch => Some(0.8),
            AnimationName::ThumbsUp => Some(1.5),
            _ => None,
        }
    }

    /// Base animation for a grounded avatar
    pub fn grounded(moving: bool, crouching: bool) -> Self {
        match (moving, crouching) {
            (true, true) => AnimationName::Walking,
            (true, false) => AnimationName::Running,
            (false, true) => AnimationName::Sitting,
            (false, false) => AnimationName::Idle,
        }
    }
}

impl std::fmt::Display for AnimationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OneShot {
    #[default]
    Idle,
    Playing {
        name: AnimationName,
        /// Seconds left; `None` waits for an external finish signal
        remaining: Option<f32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationState {
    pub base: AnimationName,
    pub one_shot: OneShot,
}

impl AnimationState {
    /// Record a new base animation. Returns true when the base changed.
    pub fn set_base(&mut self, name: AnimationName) -> bool {
        let changed = self.base != name;
        self.base = name;
        changed
    }

    /// Start a one-shot with its nominal duration, replacing any running one.
    /// Looping animations are rejected.
    pub fn play_one_shot(&mut self, name: AnimationName) -> bool {
        if !name.is_one_shot() {
            return false;
        }
        self.play_one_shot_for(name, name.nominal_duration());
        true
    }

    /// Start a one-shot with an explicit duration (or none, to wait for `finish_one_shot`)
    pub fn play_one_shot_for(&mut self, name: AnimationName, remaining: Option<f32>) {
        self.one_shot = OneShot::Playing { name, remaining };
    }

    /// Advance timed one-shots. Returns the one-shot that finished this tick, if any.
    pub fn tick(&mut self, dt: f32) -> Option<AnimationName> {
        if let OneShot::Playing { name, remaining: Some(left) } = &mut self.one_shot {
            *left -= dt;
            if *left <= 0.0 {
                let finished = *name;
                self.one_shot = OneShot::Idle;
                return Some(finished);
            }
        }
        None
    }

    /// The presentation layer reports the one-shot clip ended
    pub fn finish_one_shot(&mut self) -> Option<AnimationName> {
        match std::mem::take(&mut self.one_shot) {
            OneShot::Playing { name, .. } => Some(name),
            OneShot::Idle => None,
        }
    }

    pub fn is_playing_one_shot(&self) -> bool {
        matches!(self.one_shot, OneShot::Playing { .. })
    }

    /// What should be displayed right now
    pub fn current(&self) -> AnimationName {
        match self.one_shot {
            OneShot::Playing { name, .. } => name,
            OneShot::Idle => self.base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for name in AnimationName::ALL {
            assert_eq!(AnimationName::from_wire(name.wire_name()), Some(name));
        }
        assert_eq!(AnimationName::from_wire("Moonwalk"), None);
    }

    #[test]
    fn test_one_shots_have_durations() {
        for name in AnimationName::ALL {
            assert_eq!(name.is_one_shot(), name.nominal_duration().is_some(), "{name}");
        }
    }

    #[test]
    fn test_one_shot_masks_base_until_done() {
        let mut anim = AnimationState::default();
        assert!(anim.play_one_shot(AnimationName::Wave));
        anim.set_base(AnimationName::Running);
        assert_eq!(anim.current(), AnimationName::Wave);

        assert_eq!(anim.tick(1.0), None);
        assert_eq!(anim.current(), AnimationName::Wave);
        assert_eq!(anim.tick(1.5), Some(AnimationName::Wave));
        assert_eq!(anim.current(), AnimationName::Running);
    }

    #[test]
    fn test_untimed_one_shot_waits_for_finish() {
        let mut anim = AnimationState::default();
        anim.play_one_shot_for(AnimationName::Death, None);
        assert_eq!(anim.tick(100.0), None);
        assert!(anim.is_playing_one_shot());
        assert_eq!(anim.finish_one_shot(), Some(AnimationName::Death));
        assert_eq!(anim.finish_one_shot(), None);
        assert_eq!(anim.current(), AnimationName::Idle);
    }

    #[test]
    fn test_looping_animation_is_not_a_one_shot() {
        let mut anim = AnimationState::default();
        assert!(!anim.play_one_shot(AnimationName::Dance));
        assert!(!anim.is_playing_one_shot());
        assert!(anim.set_base(AnimationName::Dance));
        assert!(!anim.set_base(AnimationName::Dance));
    }

    #[test]
    fn test_grounded_base_table() {
        assert_eq!(AnimationName::grounded(true, false), AnimationName::Running);
        assert_eq!(AnimationName::grounded(true, true), AnimationName::Walking);
        assert_eq!(AnimationName::grounded(false, true), AnimationName::Sitting);
        assert_eq!(AnimationName::grounded(false, false), AnimationName::Idle);
    }
}
