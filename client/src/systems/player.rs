//! Local avatar systems
//!
//! Steps the locally controlled avatar, reports it to the server, and keeps its
//! placeholder body in sync.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::Connected;
use shared::{
    state_report_interval, AnimationName, AvatarState, InputChannel, LocalAvatar, PlayerAction,
    PlayerStateReport, ReliableChannel, ViewMode, WorldObstacles, WorldTerrain, AVATAR_RADIUS,
    STANDING_HEIGHT,
};

use crate::input::ClientInput;

// =============================================================================
// COMPONENTS & RESOURCES
// =============================================================================

/// Shared meshes/materials for avatar placeholders
#[derive(Resource, Clone)]
pub struct AvatarAssets {
    pub body_mesh: Handle<Mesh>,
    pub local_material: Handle<StandardMaterial>,
    pub remote_material: Handle<StandardMaterial>,
}

/// Root of an avatar placeholder. Sits at the feet; scaled vertically with body height.
#[derive(Component, Default)]
pub struct AvatarVisual {
    /// Animation last shown, to log transitions once
    pub shown: AnimationName,
}

/// Marker for the local avatar's placeholder (hidden in first person)
#[derive(Component)]
pub struct LocalAvatarVisual;

/// Fires at the state report rate
#[derive(Resource)]
pub struct StateReportTimer(pub Timer);

impl Default for StateReportTimer {
    fn default() -> Self {
        Self(Timer::new(state_report_interval(), TimerMode::Repeating))
    }
}

// =============================================================================
// ASSET LOADING
// =============================================================================

pub fn setup_avatar_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let body_mesh = meshes.add(Capsule3d::new(AVATAR_RADIUS, STANDING_HEIGHT - 2.0 * AVATAR_RADIUS));
    let local_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.45, 0.85),
        perceptual_roughness: 0.7,
        ..default()
    });
    let remote_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.85, 0.45, 0.2),
        perceptual_roughness: 0.7,
        ..default()
    });
    commands.insert_resource(AvatarAssets {
        body_mesh,
        local_material,
        remote_material,
    });
}

/// Spawn an avatar placeholder: a root at the feet with the capsule body above it
pub fn spawn_avatar_visual(
    commands: &mut Commands,
    assets: &AvatarAssets,
    material: Handle<StandardMaterial>,
    state: &AvatarState,
) -> Entity {
    commands
        .spawn((
            AvatarVisual::default(),
            avatar_transform(state),
            Visibility::default(),
        ))
        .with_children(|root| {
            root.spawn((
                Mesh3d(assets.body_mesh.clone()),
                MeshMaterial3d(material),
                Transform::from_xyz(0.0, STANDING_HEIGHT * 0.5, 0.0),
            ));
        })
        .id()
}

/// Root transform for an avatar placeholder
pub fn avatar_transform(state: &AvatarState) -> Transform {
    Transform::from_translation(state.model_translation())
        .with_rotation(state.model_rotation())
        .with_scale(Vec3::new(1.0, state.height / STANDING_HEIGHT, 1.0))
}

/// Sync a placeholder's pose and log animation changes
pub fn apply_avatar_state(transform: &mut Transform, visual: &mut AvatarVisual, state: &AvatarState) {
    *transform = avatar_transform(state);
    let current = state.animation.current();
    if visual.shown != current {
        debug!("Avatar animation {} -> {}", visual.shown, current);
        visual.shown = current;
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Advance the local avatar one frame
pub fn step_local_avatar(
    input: Res<ClientInput>,
    mut avatar: ResMut<LocalAvatar>,
    terrain: Res<WorldTerrain>,
    obstacles: Res<WorldObstacles>,
    time: Res<Time>,
    mut client_query: Query<&mut MessageSender<PlayerAction>, (With<crate::GameClient>, With<Connected>)>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }

    let outcome = avatar.step(&input.flags, &terrain, &obstacles.0, dt);
    if outcome.jumped {
        if let Ok(mut sender) = client_query.single_mut() {
            sender.send::<ReliableChannel>(PlayerAction {
                action_name: AnimationName::Jump.wire_name().to_string(),
            });
        }
    }
}

/// Send the local avatar's state at the report rate
pub fn send_state_report(
    avatar: Res<LocalAvatar>,
    time: Res<Time>,
    mut timer: ResMut<StateReportTimer>,
    mut client_query: Query<&mut MessageSender<PlayerStateReport>, (With<crate::GameClient>, With<Connected>)>,
    mut last_warn_time: Local<f32>,
) {
    timer.0.tick(time.delta());
    if !timer.0.just_finished() {
        return;
    }

    let Ok(mut sender) = client_query.single_mut() else {
        let now = time.elapsed_secs();
        if now - *last_warn_time > 1.0 {
            warn!("send_state_report: missing connected GameClient with MessageSender<PlayerStateReport>");
            *last_warn_time = now;
        }
        return;
    };

    let report = avatar.state_report(time.elapsed_secs_f64() * 1000.0);
    sender.send::<InputChannel>(report);
}

// =============================================================================
// VISUALS
// =============================================================================

pub fn spawn_local_avatar_visual(
    mut commands: Commands,
    assets: Res<AvatarAssets>,
    avatar: Res<LocalAvatar>,
) {
    let entity = spawn_avatar_visual(
        &mut commands,
        &assets,
        assets.local_material.clone(),
        &avatar.state,
    );
    commands.entity(entity).insert(LocalAvatarVisual);
}

/// Keep the local placeholder on the avatar; hide it while looking through its eyes
pub fn sync_local_avatar_visual(
    avatar: Res<LocalAvatar>,
    mut visuals: Query<(&mut Transform, &mut Visibility, &mut AvatarVisual), With<LocalAvatarVisual>>,
) {
    for (mut transform, mut visibility, mut visual) in visuals.iter_mut() {
        apply_avatar_state(&mut transform, &mut visual, &avatar.state);
        *visibility = match avatar.state.view_mode {
            ViewMode::FirstPerson => Visibility::Hidden,
            ViewMode::ThirdPerson => Visibility::Inherited,
        };
    }
}

/// Leaving gameplay: remove every avatar placeholder
pub fn despawn_avatar_visuals(mut commands: Commands, visuals: Query<Entity, With<AvatarVisual>>) {
    for entity in visuals.iter() {
        commands.entity(entity).despawn();
    }
}
