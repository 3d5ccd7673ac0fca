//! World systems
//!
//! Spawning and tearing down the static environment.

use bevy::prelude::*;
use bevy::light::CascadeShadowConfigBuilder;

// =============================================================================
// COMPONENTS
// =============================================================================

/// Root entity for all client-side world visuals
#[derive(Component)]
pub struct ClientWorldRoot;

/// Marker for the sun directional light
#[derive(Component)]
pub struct SunLight;

// =============================================================================
// SPAWNING
// =============================================================================

/// Spawn the world root and its lights. Terrain and obstacles attach to the root.
pub fn spawn_world(mut commands: Commands, world_roots: Query<Entity, With<ClientWorldRoot>>) {
    if !world_roots.is_empty() {
        return;
    }

    let root = commands
        // Parent of terrain / obstacles / lights; needs GlobalTransform so children don't warn.
        .spawn((
            ClientWorldRoot,
            Transform::default(),
            GlobalTransform::default(),
            Visibility::default(),
            InheritedVisibility::default(),
        ))
        .id();

    let sun_light_entity = commands
        .spawn((
            SunLight,
            DirectionalLight {
                illuminance: 12_000.0,
                shadows_enabled: true,
                color: Color::srgb(1.0, 0.97, 0.9),
                ..default()
            },
            CascadeShadowConfigBuilder {
                num_cascades: 3,
                maximum_distance: 120.0,
                first_cascade_far_bound: 12.0,
                ..default()
            }
            .build(),
            Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
        ))
        .id();
    commands.entity(root).add_child(sun_light_entity);

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.85, 0.9, 1.0),
        brightness: 300.0,
        affects_lightmapped_meshes: true,
    });

    info!("Spawned client world root");
}

/// Leaving gameplay: remove everything under the world root
pub fn despawn_world(mut commands: Commands, world_roots: Query<Entity, With<ClientWorldRoot>>) {
    for root in world_roots.iter() {
        commands.entity(root).despawn();
    }
}
