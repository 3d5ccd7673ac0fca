//! Connection systems
//!
//! Networking, the `Welcome` handshake, cursor management, and teardown.

use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};
use lightyear::prelude::*;
use lightyear::prelude::client::*;
use shared::{
    ActionBroadcast, LocalAvatar, PlayerAction, PlayerId, PlayerLeft, PlayerStateReport,
    RemoteRoster, SimConfig, Welcome, WorldObstacles, WorldSnapshot, WorldTerrain, PRIVATE_KEY,
    PROTOCOL_ID, SERVER_ADDR, SERVER_PORT,
};
use std::net::{Ipv4Addr, SocketAddr};

use crate::states::GameState;

/// Our player id, as assigned by the server
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPlayerId(pub PlayerId);

// =============================================================================
// CONNECTION
// =============================================================================

/// Start connection to server
/// In Lightyear 0.25, we spawn a Client entity with the appropriate networking components
/// and then trigger the Connect event to initiate the connection
pub fn start_connection(
    mut commands: Commands,
    existing_clients: Query<Entity, With<crate::GameClient>>,
) {
    info!("Initiating connection to server at {}:{}...", SERVER_ADDR, SERVER_PORT);

    // Only ever one GameClient entity, or `single()` lookups start failing.
    for e in existing_clients.iter() {
        commands.entity(e).despawn();
    }

    let server_addr: SocketAddr = match format!("{}:{}", SERVER_ADDR, SERVER_PORT).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address {}:{}: {}", SERVER_ADDR, SERVER_PORT, e);
            return;
        }
    };
    let local_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));

    let client_id = rand::random::<u64>();

    // Build authentication (netcode connect token)
    let auth = Authentication::Manual {
        server_addr,
        protocol_id: PROTOCOL_ID,
        private_key: PRIVATE_KEY,
        client_id,
    };
    let netcode = match NetcodeClient::new(auth, NetcodeConfig::default()) {
        Ok(netcode) => netcode,
        Err(e) => {
            error!("Failed to create netcode client: {:?}", e);
            return;
        }
    };

    let client_entity = commands
        .spawn((
            crate::GameClient,
            Client::default(),
            UdpIo::default(),
            LocalAddr(local_addr),
            PeerAddr(server_addr),
            netcode,
            // Client -> Server
            MessageSender::<PlayerStateReport>::default(),
            MessageSender::<PlayerAction>::default(),
            // Server -> Client
            MessageReceiver::<Welcome>::default(),
            MessageReceiver::<WorldSnapshot>::default(),
            MessageReceiver::<ActionBroadcast>::default(),
            MessageReceiver::<PlayerLeft>::default(),
        ))
        .id();

    commands.trigger(Connect { entity: client_entity });

    info!("Client entity spawned, client_id: {}", client_id);
}

/// Wait for the server's `Welcome`, then build the local avatar and start playing
pub fn check_connection(
    mut commands: Commands,
    mut next_state: ResMut<NextState<GameState>>,
    config: Res<SimConfig>,
    terrain: Res<WorldTerrain>,
    obstacles: Res<WorldObstacles>,
    new_connections: Query<Entity, (With<crate::GameClient>, Added<Connected>)>,
    mut welcome_query: Query<&mut MessageReceiver<Welcome>, (With<crate::GameClient>, With<Connected>)>,
) {
    for _entity in new_connections.iter() {
        info!("Connected to server, waiting for welcome");
    }

    let Ok(mut receiver) = welcome_query.single_mut() else {
        return;
    };
    let Some(welcome) = receiver.receive().last() else {
        return;
    };

    let mut avatar = LocalAvatar::new(welcome.spawn_position, config.locomotion);
    avatar.place_on_ground(&terrain, &obstacles.0);
    info!(
        "Welcome: player {} spawned at {:?}",
        welcome.player_id, avatar.state.position
    );

    commands.insert_resource(avatar);
    commands.insert_resource(LocalPlayerId(welcome.player_id));
    next_state.set(GameState::Playing);
}

/// Drop back to connecting when the link goes away
pub fn check_disconnection(
    mut next_state: ResMut<NextState<GameState>>,
    new_disconnections: Query<Entity, (With<crate::GameClient>, Added<Disconnected>)>,
) {
    for _entity in new_disconnections.iter() {
        warn!("Disconnected from server");
        next_state.set(GameState::Connecting);
    }
}

/// Leaving gameplay: forget the session
pub fn exit_playing(
    mut commands: Commands,
    mut roster: ResMut<RemoteRoster>,
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
) {
    commands.remove_resource::<LocalAvatar>();
    commands.remove_resource::<LocalPlayerId>();
    roster.clear();

    if let Ok(window_entity) = windows.single() {
        if let Ok(mut cursor) = cursor_opts.get_mut(window_entity) {
            cursor.grab_mode = CursorGrabMode::None;
            cursor.visible = true;
        }
    }
}

// =============================================================================
// CURSOR
// =============================================================================

/// Grab cursor on click, release on Escape
pub fn grab_cursor(
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
) {
    let Ok(window_entity) = windows.single() else {
        return;
    };
    let Ok(mut cursor) = cursor_opts.get_mut(window_entity) else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        cursor.grab_mode = CursorGrabMode::Locked;
        cursor.visible = false;
    } else if keyboard.just_pressed(KeyCode::Escape) {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
    }
}
