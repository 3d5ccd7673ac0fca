//! Local avatar locomotion: a small character controller over the height field.
//!
//! One call to [`LocalAvatar::step`] per frame runs, in order:
//! 1. crouch transition (feet stay planted, re-snap to the support when grounded)
//! 2. horizontal intent from the input flags and the view basis
//! 3. gravity and jump
//! 4. tentative displacement
//! 5. vertical resolution (obstacle tops win over terrain)
//! 6. horizontal veto against blocking obstacles (XZ only, Y is kept)
//! 7. base animation selection
//!
//! Only a jump sets `airborne`; only a snap clears it. Walking off an edge
//! therefore falls without counting as a jump.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::AnimationName;
use crate::avatar::{body_height, lerp_angle, AvatarState};
use crate::obstacles::CollisionIndex;
use crate::protocol::PlayerStateReport;
use crate::terrain::WorldTerrain;
use crate::view::{LookState, ViewMode};

/// Downward acceleration in m/s^2
pub const GRAVITY: f32 = 20.0;
/// Vertical launch speed in m/s
pub const JUMP_IMPULSE: f32 = 10.0;
pub const CROUCH_JUMP_IMPULSE: f32 = 7.0;
/// Horizontal speed in m/s
pub const RUN_SPEED: f32 = 10.0;
pub const CROUCH_SPEED: f32 = 5.0;
/// Third-person turn rate toward the walking direction (fraction per second)
pub const TURN_SPEED: f32 = 10.0;

/// Locomotion tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocomotionConfig {
    pub gravity: f32,
    pub jump_impulse: f32,
    pub crouch_jump_impulse: f32,
    pub run_speed: f32,
    pub crouch_speed: f32,
    pub turn_speed: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            jump_impulse: JUMP_IMPULSE,
            crouch_jump_impulse: CROUCH_JUMP_IMPULSE,
            run_speed: RUN_SPEED,
            crouch_speed: CROUCH_SPEED,
            turn_speed: TURN_SPEED,
        }
    }
}

/// Held input for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub crouch: bool,
}

impl InputFlags {
    /// (right, forward) axes in [-1, 1]; opposite keys cancel
    pub fn axes(&self) -> Vec2 {
        let axis = |pos: bool, neg: bool| pos as i8 as f32 - neg as i8 as f32;
        Vec2::new(axis(self.right, self.left), axis(self.forward, self.backward))
    }
}

/// What happened during a step, for collaborators outside the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// Horizontal movement was vetoed by an obstacle
    pub blocked: bool,
    /// A jump started this step
    pub jumped: bool,
    /// The avatar touched down after a jump
    pub landed: bool,
}

/// The locally controlled avatar
#[derive(Resource, Debug, Clone)]
pub struct LocalAvatar {
    pub state: AvatarState,
    pub look: LookState,
    pub airborne: bool,
    pub config: LocomotionConfig,
}

impl LocalAvatar {
    pub fn new(position: Vec3, config: LocomotionConfig) -> Self {
        let look = LookState::default();
        let mut state = AvatarState::at(position);
        state.model_rotation_y = look.first_person_facing();
        Self {
            state,
            look,
            airborne: false,
            config,
        }
    }

    /// Height of the surface under the avatar: an obstacle top it stands on, else terrain
    pub fn support_height(&self, terrain: &WorldTerrain, obstacles: &CollisionIndex) -> f32 {
        let s = &self.state;
        obstacles
            .standing_surface(s.position, &s.body(), s.velocity.y)
            .unwrap_or_else(|| terrain.height_at(s.position.x, s.position.z))
    }

    /// Drop (or lift) the avatar onto its support and stop vertical motion
    pub fn place_on_ground(&mut self, terrain: &WorldTerrain, obstacles: &CollisionIndex) {
        let support = self.support_height(terrain, obstacles);
        self.state.position.y = support + self.state.height;
        self.state.velocity.y = 0.0;
        self.airborne = false;
    }

    pub fn apply_mouse_motion(&mut self, delta: Vec2) {
        self.look.apply_mouse_motion(self.state.view_mode, delta);
        if self.state.view_mode == ViewMode::FirstPerson {
            self.state.model_rotation_y = self.look.first_person_facing();
            self.state.pitch = self.look.pitch;
        }
    }

    pub fn apply_zoom(&mut self, wheel_delta: f32) {
        self.look.apply_zoom(self.state.view_mode, wheel_delta);
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.state.view_mode = self.look.toggle_view_mode(self.state.view_mode);
        self.state.view_mode
    }

    /// Start an emote. Looping animations are ignored, and so is any emote
    /// while another one-shot (a jump included) is still playing.
    pub fn play_emote(&mut self, emote: AnimationName) -> bool {
        if self.state.animation.is_playing_one_shot() {
            return false;
        }
        self.state.animation.play_one_shot(emote)
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(
        &mut self,
        input: &InputFlags,
        terrain: &WorldTerrain,
        obstacles: &CollisionIndex,
        dt: f32,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let cfg = self.config;

        // 1. Crouch
        if input.crouch != self.state.is_crouching {
            let old_height = self.state.height;
            self.state.is_crouching = input.crouch;
            self.state.height = body_height(input.crouch);
            self.state.position.y += self.state.height - old_height;
            if !self.airborne {
                self.state.position.y = self.support_height(terrain, obstacles) + self.state.height;
            }
        }

        // 2. Horizontal intent
        let mode = self.state.view_mode;
        let axes = input.axes();
        let forward = self.look.camera_forward(mode);
        let right = self.look.camera_right(mode);
        let direction = (forward * axes.y + right * axes.x).normalize_or_zero();
        let moving = direction != Vec3::ZERO;

        match mode {
            ViewMode::FirstPerson => {
                self.state.model_rotation_y = self.look.first_person_facing();
                self.state.pitch = self.look.pitch;
            }
            ViewMode::ThirdPerson if moving => {
                let target = direction.x.atan2(direction.z);
                let t = (dt * cfg.turn_speed).min(1.0);
                self.state.model_rotation_y = lerp_angle(self.state.model_rotation_y, target, t);
            }
            ViewMode::ThirdPerson => {}
        }

        // 3. Gravity and jump
        self.state.velocity.y -= cfg.gravity * dt;
        if input.jump && !self.airborne {
            self.state.velocity.y = if self.state.is_crouching {
                cfg.crouch_jump_impulse
            } else {
                cfg.jump_impulse
            };
            self.airborne = true;
            outcome.jumped = true;
        }

        // 4. Tentative displacement
        let speed = if self.state.is_crouching { cfg.crouch_speed } else { cfg.run_speed };
        let previous = self.state.position;
        self.state.velocity.x = direction.x * speed;
        self.state.velocity.z = direction.z * speed;
        self.state.position += self.state.velocity * dt;

        // 5. Vertical resolution
        let body = self.state.body();
        let position = self.state.position;
        let obstacle_top = obstacles
            .standing_surface(position, &body, self.state.velocity.y)
            .filter(|top| position.y <= top + body.height);
        let support = obstacle_top.or_else(|| {
            let ground = terrain.height_at(position.x, position.z);
            (position.y <= ground + body.height).then_some(ground)
        });
        if let Some(surface) = support {
            self.state.position.y = surface + body.height;
            self.state.velocity.y = 0.0;
            outcome.landed = self.airborne;
            self.airborne = false;
        }

        // 6. Horizontal veto
        if obstacles.blocking_obstacle(self.state.position, &body).is_some() {
            self.state.position.x = previous.x;
            self.state.position.z = previous.z;
            outcome.blocked = true;
        }

        // 7. Animation
        self.look.update_eye_height(self.state.is_crouching, dt);
        let animation = &mut self.state.animation;
        animation.tick(dt);
        if outcome.jumped {
            animation.play_one_shot(AnimationName::Jump);
        }
        if !animation.is_playing_one_shot() {
            let base = if self.airborne {
                AnimationName::Jump
            } else {
                AnimationName::grounded(moving, self.state.is_crouching)
            };
            animation.set_base(base);
        }

        outcome
    }

    /// The periodic state report sent to the server. Carries the base animation;
    /// one-shots travel as actions.
    pub fn state_report(&self, timestamp_ms: f64) -> PlayerStateReport {
        let s = &self.state;
        PlayerStateReport {
            timestamp_ms,
            position: s.position,
            velocity: s.velocity,
            model_rotation_y: s.model_rotation_y,
            pitch_rotation_x: s.pitch,
            is_crouching: s.is_crouching,
            height: s.height,
            animation: s.animation.base,
            view_mode: s.view_mode,
        }
    }
}
