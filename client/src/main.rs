//! Grove client - renders the shared world, simulates the local avatar and
//! interpolates everyone else
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod camera;
mod input;
mod states;
mod systems;
mod terrain;

use bevy::prelude::*;
use bevy::window::WindowResolution;
use lightyear::prelude::client::ClientPlugins;
use shared::{
    build_world, load_sim_config_or_default, tick_duration, ProtocolPlugin, RemoteRoster,
    SERVER_ADDR, SERVER_PORT, SIM_CONFIG_FILE,
};
use states::GameState;

/// Marker component for our client entity
#[derive(Component)]
pub struct GameClient;

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "Grove".to_string(),
            resolution: WindowResolution::new(1280, 720),
            ..default()
        }),
        ..default()
    }));

    // Game state machine
    app.init_state::<GameState>();

    // Lightyear client plugins (tick_duration = 60Hz)
    app.add_plugins(ClientPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    // Shared world: every peer builds the same terrain and obstacles from the config.
    // Loaded after DefaultPlugins so LogPlugin is already installed.
    let config = load_sim_config_or_default(SIM_CONFIG_FILE);
    let (world_terrain, world_obstacles) = build_world(&config);
    app.insert_resource(RemoteRoster::new(config.interpolation_delay_ms));
    app.insert_resource(world_terrain);
    app.insert_resource(world_obstacles);
    app.insert_resource(config);
    app.init_resource::<input::ClientInput>();
    app.init_resource::<systems::StateReportTimer>();

    app.add_systems(Startup, (systems::setup_rendering, systems::setup_avatar_assets));

    // Connection systems
    app.add_systems(OnEnter(GameState::Connecting), systems::start_connection);
    app.add_systems(
        Update,
        systems::check_connection.run_if(in_state(GameState::Connecting)),
    );
    app.add_systems(Update, systems::check_disconnection);

    app.add_systems(
        OnEnter(GameState::Playing),
        (
            systems::spawn_world,
            terrain::spawn_terrain,
            systems::spawn_local_avatar_visual,
        )
            .chain(),
    );
    app.add_systems(
        OnExit(GameState::Playing),
        (
            systems::despawn_world,
            systems::despawn_avatar_visuals,
            systems::exit_playing,
        ),
    );

    // ORDER MATTERS: input -> local step -> network -> remote interpolation -> visuals -> camera.
    app.add_systems(
        Update,
        (
            input::handle_keyboard_input,
            input::handle_mouse_input,
            input::handle_emote_input,
            systems::step_local_avatar,
            systems::send_state_report,
            systems::receive_world_snapshots,
            systems::receive_actions,
            systems::receive_player_left,
            systems::update_remote_avatars,
            systems::sync_local_avatar_visual,
            systems::sync_remote_visuals,
            camera::update_camera,
        )
            .chain()
            .run_if(in_state(GameState::Playing)),
    );
    app.add_systems(
        Update,
        systems::grab_cursor.run_if(in_state(GameState::Playing)),
    );

    info!("Starting Grove client, server at {}:{}", SERVER_ADDR, SERVER_PORT);
    app.run();
}
