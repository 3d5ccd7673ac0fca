//! Shared simulation core for client and server

pub mod animation;
pub mod avatar;
pub mod config;
pub mod interpolation;
pub mod locomotion;
pub mod obstacles;
pub mod protocol;
pub mod terrain;
pub mod view;

pub use animation::{AnimationName, AnimationState, OneShot};
pub use avatar::{
    body_height, lerp_angle, wrap_angle, AvatarState, AVATAR_RADIUS, CROUCH_HEIGHT,
    STANDING_HEIGHT,
};
pub use config::{
    load_sim_config_from_file, load_sim_config_from_str, load_sim_config_or_default, SimConfig,
    MAX_TERRAIN_RESOLUTION, SIM_CONFIG_FILE,
};
pub use interpolation::{
    InterpolatedPose, RemoteRoster, Snapshot, SnapshotBuffer, SnapshotInterpolator,
    INTERPOLATION_DELAY_MS, SNAPSHOT_BUFFER_CAPACITY,
};
pub use locomotion::{InputFlags, LocalAvatar, LocomotionConfig, StepOutcome};
pub use obstacles::{
    BodyShape, CollidableObject, CollisionIndex, ObstacleKind, VegetationSettings, WorldObstacles,
};
pub use protocol::*;
pub use terrain::{HeightField, TerrainMeshData, TerrainSettings, WorldTerrain};
pub use view::{LookState, ViewMode};

/// Build the terrain and obstacle resources every peer shares
pub fn build_world(config: &config::SimConfig) -> (WorldTerrain, WorldObstacles) {
    let terrain = WorldTerrain::build(config.terrain);
    let obstacles = match terrain.field.as_ref() {
        Some(field) => CollisionIndex::scatter(field, &config.vegetation),
        None => CollisionIndex::new(),
    };
    (terrain, WorldObstacles(obstacles))
}
