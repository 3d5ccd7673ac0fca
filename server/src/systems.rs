//! Server-side relay systems
//!
//! Updated for Lightyear 0.25

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;

use shared::{
    snapshot_interval, ActionBroadcast, PlayerAction, PlayerId, PlayerLeft, PlayerStateReport,
    ReliableChannel, SnapshotChannel, Welcome, WorldSnapshot,
};

use crate::room::Room;

/// Fires at the world snapshot rate
#[derive(Resource)]
pub struct SnapshotTimer(pub Timer);

impl Default for SnapshotTimer {
    fn default() -> Self {
        Self(Timer::new(snapshot_interval(), TimerMode::Repeating))
    }
}

/// Spawn position waiting to be sent to a freshly connected client
#[derive(Component)]
pub struct PendingWelcome(pub Vec3);

/// Convert a lightyear PeerId to the player id used on the wire
pub fn peer_id_to_u64(peer_id: PeerId) -> PlayerId {
    match peer_id {
        PeerId::Netcode(id) => id,
        PeerId::Steam(id) => id,
        PeerId::Local(id) => id,
        PeerId::Entity(id) => id,
        PeerId::Raw(addr) => {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            addr.hash(&mut hasher);
            hasher.finish()
        }
        PeerId::Server => 0,
    }
}

/// Set up message I/O on new client links and register them in the room
pub fn handle_connections(
    mut commands: Commands,
    new_clients: Query<(Entity, &RemoteId), (Added<Connected>, With<ClientOf>)>,
    mut room: ResMut<Room>,
) {
    for (client_entity, remote_id) in new_clients.iter() {
        let player_id = peer_id_to_u64(remote_id.0);
        let spawn = room.join(player_id, &mut rand::thread_rng());
        info!("Client connected: {:?} as player {}", remote_id.0, player_id);

        // Lightyear 0.25 needs message I/O on the link entity (ClientOf + Connected)
        commands.entity(client_entity).insert((
            // Client -> Server
            MessageReceiver::<PlayerStateReport>::default(),
            MessageReceiver::<PlayerAction>::default(),
            // Server -> Client
            MessageSender::<Welcome>::default(),
            MessageSender::<ActionBroadcast>::default(),
            MessageSender::<PlayerLeft>::default(),
            MessageSender::<WorldSnapshot>::default(),
            PendingWelcome(spawn),
        ));
    }
}

/// Send each new client its id and spawn point, once its sender exists
pub fn send_welcomes(
    mut commands: Commands,
    mut pending: Query<(Entity, &RemoteId, &PendingWelcome, &mut MessageSender<Welcome>), With<Connected>>,
) {
    for (client_entity, remote_id, welcome, mut sender) in pending.iter_mut() {
        let player_id = peer_id_to_u64(remote_id.0);
        sender.send::<ReliableChannel>(Welcome {
            player_id,
            spawn_position: welcome.0,
        });
        commands.entity(client_entity).remove::<PendingWelcome>();
    }
}

/// Observer: a client link got `Disconnected`
pub fn handle_disconnections(
    trigger: On<Add, Disconnected>,
    client_entities: Query<&RemoteId, With<ClientOf>>,
    mut others: Query<(&RemoteId, &mut MessageSender<PlayerLeft>), With<Connected>>,
    mut room: ResMut<Room>,
    time: Res<Time>,
) {
    let client_entity = trigger.entity;
    let Ok(remote_id) = client_entities.get(client_entity) else {
        warn!("Disconnect trigger for entity {:?} but no RemoteId found", client_entity);
        return;
    };
    let player_id = peer_id_to_u64(remote_id.0);
    info!("Client {:?} disconnected (player {})", remote_id.0, player_id);

    if !room.leave(player_id) {
        return;
    }
    // same clock as the snapshot timestamps
    let timestamp_ms = time.elapsed_secs_f64() * 1000.0;
    for (other, mut sender) in others.iter_mut() {
        if peer_id_to_u64(other.0) == player_id {
            continue;
        }
        sender.send::<ReliableChannel>(PlayerLeft {
            player_id,
            timestamp_ms,
        });
    }
}

/// Store the newest state report from every client
pub fn receive_state_reports(
    mut room: ResMut<Room>,
    mut client_links: Query<(&RemoteId, &mut MessageReceiver<PlayerStateReport>), With<ClientOf>>,
) {
    for (remote_id, mut receiver) in client_links.iter_mut() {
        let player_id = peer_id_to_u64(remote_id.0);
        for report in receiver.receive() {
            if !room.apply_report(player_id, &report) {
                debug!("State report from unregistered player {}", player_id);
            }
        }
    }
}

/// Relay one-shot actions to every other client
pub fn relay_actions(
    mut room: ResMut<Room>,
    mut receivers: Query<(&RemoteId, &mut MessageReceiver<PlayerAction>), With<ClientOf>>,
    mut senders: Query<(&RemoteId, &mut MessageSender<ActionBroadcast>), (With<ClientOf>, With<Connected>)>,
) {
    let mut actions: Vec<(PlayerId, String)> = Vec::new();
    for (remote_id, mut receiver) in receivers.iter_mut() {
        let player_id = peer_id_to_u64(remote_id.0);
        for action in receiver.receive() {
            if room.record_action(player_id, &action.action_name) {
                debug!("Player {} action {}", player_id, action.action_name);
                actions.push((player_id, action.action_name));
            } else {
                warn!("Action {:?} from unknown player {}", action.action_name, player_id);
            }
        }
    }

    if actions.is_empty() {
        return;
    }
    for (remote_id, mut sender) in senders.iter_mut() {
        let target = peer_id_to_u64(remote_id.0);
        for (player_id, action_name) in &actions {
            if *player_id == target {
                continue;
            }
            sender.send::<ReliableChannel>(ActionBroadcast {
                player_id: *player_id,
                action_name: action_name.clone(),
            });
        }
    }
}

/// Broadcast everyone's latest state at the snapshot rate
pub fn broadcast_snapshots(
    time: Res<Time>,
    mut timer: ResMut<SnapshotTimer>,
    mut room: ResMut<Room>,
    mut senders: Query<&mut MessageSender<WorldSnapshot>, (With<ClientOf>, With<Connected>)>,
) {
    timer.0.tick(time.delta());
    if !timer.0.just_finished() || room.is_empty() {
        return;
    }

    let snapshot = room.snapshot(time.elapsed_secs_f64() * 1000.0);
    for mut sender in senders.iter_mut() {
        sender.send::<SnapshotChannel>(snapshot.clone());
    }
}
