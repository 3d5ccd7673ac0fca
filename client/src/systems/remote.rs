//! Remote avatar systems
//!
//! Snapshots and actions from the server feed the `RemoteRoster`; every frame the
//! roster is advanced and the placeholders follow it.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::Connected;
use shared::{ActionBroadcast, PlayerId, PlayerLeft, RemoteRoster, WorldSnapshot};
use std::collections::HashSet;

use super::connection::LocalPlayerId;
use super::player::{apply_avatar_state, spawn_avatar_visual, AvatarAssets, AvatarVisual};

/// Placeholder owned by a remote player
#[derive(Component)]
pub struct RemoteAvatarVisual {
    pub player_id: PlayerId,
}

/// Local clock in milliseconds
fn now_ms(time: &Time) -> f64 {
    time.elapsed_secs_f64() * 1000.0
}

/// Append arriving world snapshots to the remote buffers, stamped with the local clock
pub fn receive_world_snapshots(
    time: Res<Time>,
    local_id: Option<Res<LocalPlayerId>>,
    mut roster: ResMut<RemoteRoster>,
    mut client_query: Query<&mut MessageReceiver<WorldSnapshot>, (With<crate::GameClient>, With<Connected>)>,
) {
    let Ok(mut receiver) = client_query.single_mut() else {
        return;
    };
    let local_id = local_id.map(|id| id.0);
    let received_at = now_ms(&time);
    for snapshot in receiver.receive() {
        roster.apply_world_snapshot(&snapshot, local_id, received_at);
    }
}

/// Start relayed one-shot actions on remote avatars
pub fn receive_actions(
    local_id: Option<Res<LocalPlayerId>>,
    mut roster: ResMut<RemoteRoster>,
    mut client_query: Query<&mut MessageReceiver<ActionBroadcast>, (With<crate::GameClient>, With<Connected>)>,
) {
    let Ok(mut receiver) = client_query.single_mut() else {
        return;
    };
    for action in receiver.receive() {
        if local_id.as_ref().is_some_and(|id| id.0 == action.player_id) {
            continue;
        }
        roster.apply_action(action.player_id, &action.action_name);
    }
}

/// Forget players the server says have left
pub fn receive_player_left(
    mut roster: ResMut<RemoteRoster>,
    mut client_query: Query<&mut MessageReceiver<PlayerLeft>, (With<crate::GameClient>, With<Connected>)>,
) {
    let Ok(mut receiver) = client_query.single_mut() else {
        return;
    };
    for left in receiver.receive() {
        roster.remove(left.player_id, left.timestamp_ms);
    }
}

/// Interpolate every remote avatar to the delayed render time
pub fn update_remote_avatars(time: Res<Time>, mut roster: ResMut<RemoteRoster>) {
    roster.update_all(now_ms(&time), time.delta_secs());
}

/// Spawn, move and despawn remote placeholders to match the roster
pub fn sync_remote_visuals(
    mut commands: Commands,
    roster: Res<RemoteRoster>,
    assets: Res<AvatarAssets>,
    mut visuals: Query<(Entity, &RemoteAvatarVisual, &mut Transform, &mut AvatarVisual)>,
) {
    let mut present: HashSet<PlayerId> = HashSet::new();

    for (entity, remote, mut transform, mut visual) in visuals.iter_mut() {
        match roster.get(remote.player_id) {
            Some(interpolator) => {
                apply_avatar_state(&mut transform, &mut visual, interpolator.state());
                present.insert(remote.player_id);
            }
            None => commands.entity(entity).despawn(),
        }
    }

    for (player_id, interpolator) in roster.iter() {
        if present.contains(&player_id) {
            continue;
        }
        let entity = spawn_avatar_visual(
            &mut commands,
            &assets,
            assets.remote_material.clone(),
            interpolator.state(),
        );
        commands.entity(entity).insert(RemoteAvatarVisual { player_id });
    }
}
