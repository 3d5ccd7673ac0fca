//! Grove relay server - headless Bevy app that forwards avatar state between peers
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod room;
mod systems;

use bevy::prelude::*;
use bevy::app::ScheduleRunnerPlugin;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
use shared::{
    get_server_bind_addr, tick_duration, ProtocolPlugin, PRIVATE_KEY, PROTOCOL_ID, SERVER_PORT,
};
use std::net::SocketAddr;

use room::Room;
use systems::SnapshotTimer;

/// Marker for our server entity
#[derive(Component)]
struct GameServer;

/// Spawn the server entity with all required networking components
fn spawn_server(mut commands: Commands) {
    let bind_addr = get_server_bind_addr();
    let server_addr: SocketAddr = match format!("{}:{}", bind_addr, SERVER_PORT).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server bind address {}:{}: {}", bind_addr, SERVER_PORT, e);
            return;
        }
    };

    info!("Spawning server entity, binding to {:?}", server_addr);

    commands.spawn((
        GameServer,
        Server::default(),
        ServerUdpIo::default(),
        LocalAddr(server_addr),
        NetcodeServer::new(NetcodeConfig {
            protocol_id: PROTOCOL_ID,
            private_key: PRIVATE_KEY,
            ..default()
        }),
    ));
}

/// Start the server after it's spawned
fn start_server(
    mut commands: Commands,
    server_query: Query<Entity, (With<GameServer>, Without<Started>, Without<Starting>)>,
) {
    for server_entity in server_query.iter() {
        info!("Starting server...");
        commands.trigger(Start { entity: server_entity });
    }
}

/// Check if server is started (run condition)
fn server_is_started(server_query: Query<(), (With<GameServer>, With<Started>)>) -> bool {
    !server_query.is_empty()
}

fn main() {
    let mut app = App::new();

    // Headless plugins. The main loop runs at the fixed tick rate so message
    // buffers are not cleared between FixedUpdate runs.
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());
    app.add_plugins(bevy::state::app::StatesPlugin);

    app.init_resource::<Room>();
    app.init_resource::<SnapshotTimer>();

    app.add_plugins(ServerPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    app.add_systems(Startup, spawn_server);
    app.add_systems(Update, start_server);

    app.add_observer(systems::handle_disconnections);

    app.add_systems(
        FixedUpdate,
        (
            systems::handle_connections,
            systems::send_welcomes,
            systems::receive_state_reports,
            systems::relay_actions,
            systems::broadcast_snapshots,
        )
            .chain()
            .run_if(server_is_started),
    );

    info!("Starting Grove relay on port {}", SERVER_PORT);
    app.run();
}
