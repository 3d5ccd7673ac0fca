//! Rendering systems
//!
//! Camera and sky setup.

use bevy::prelude::*;
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::light::DirectionalLightShadowMap;
use bevy::render::view::Msaa;

/// Daytime sky color
const SKY_COLOR: Color = Color::srgb(0.53, 0.74, 0.92);

/// One-time rendering setup.
pub fn setup_rendering(mut commands: Commands) {
    // Directional light shadows are expensive; one modest map is enough for a small world.
    commands.insert_resource(DirectionalLightShadowMap { size: 1024 });
    commands.insert_resource(ClearColor(SKY_COLOR));

    commands.spawn((
        Camera3d::default(),
        Msaa::Off,
        Tonemapping::AcesFitted,
        Transform::from_xyz(0.0, 10.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    info!("Client rendering initialized");
}
