//! Client-side terrain and vegetation rendering
//!
//! Updated for Bevy 0.17

use bevy::prelude::*;
use bevy::mesh::{Indices, VertexAttributeValues};
use bevy::render::render_resource::PrimitiveTopology;
use bevy::asset::RenderAssetUsages;

use shared::{HeightField, ObstacleKind, WorldObstacles, WorldTerrain};

use crate::systems::ClientWorldRoot;

/// Marker component for the terrain mesh entity
#[derive(Component)]
pub struct TerrainMesh;

/// Marker for tree and rock visuals
#[derive(Component)]
pub struct ObstacleVisual;

/// Build a render mesh from the shared height field
pub fn build_terrain_mesh(field: &HeightField) -> Mesh {
    let mesh_data = field.mesh_data();

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(
        Mesh::ATTRIBUTE_POSITION,
        VertexAttributeValues::Float32x3(mesh_data.positions),
    );
    mesh.insert_attribute(
        Mesh::ATTRIBUTE_NORMAL,
        VertexAttributeValues::Float32x3(mesh_data.normals),
    );
    mesh.insert_attribute(
        Mesh::ATTRIBUTE_UV_0,
        VertexAttributeValues::Float32x2(mesh_data.uvs),
    );
    mesh.insert_indices(Indices::U32(mesh_data.indices));
    mesh
}

/// Spawn the ground mesh plus one visual per collidable obstacle
pub fn spawn_terrain(
    mut commands: Commands,
    terrain: Res<WorldTerrain>,
    obstacles: Res<WorldObstacles>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    world_root_query: Query<Entity, With<ClientWorldRoot>>,
) {
    let Ok(world_root) = world_root_query.single() else {
        return;
    };

    match terrain.field.as_ref() {
        Some(field) => {
            let material = materials.add(StandardMaterial {
                base_color: Color::srgb(0.33, 0.55, 0.25),
                perceptual_roughness: 0.9,
                metallic: 0.0,
                ..default()
            });
            let entity = commands
                .spawn((
                    Mesh3d(meshes.add(build_terrain_mesh(field))),
                    MeshMaterial3d(material),
                    Transform::default(),
                    TerrainMesh,
                ))
                .id();
            commands.entity(world_root).add_child(entity);
        }
        None => warn!("No height field; rendering without terrain"),
    }

    let trunk_mesh = meshes.add(Cylinder::new(0.3, 1.0));
    let canopy_mesh = meshes.add(Cone::new(1.5, 3.0));
    let rock_mesh = meshes.add(Sphere::new(1.0));
    let trunk_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.4, 0.26, 0.13),
        perceptual_roughness: 0.9,
        ..default()
    });
    let canopy_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.13, 0.4, 0.16),
        perceptual_roughness: 0.8,
        ..default()
    });
    let rock_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.5, 0.5, 0.52),
        perceptual_roughness: 0.95,
        ..default()
    });

    for obstacle in obstacles.0.iter() {
        let ground = obstacle.position;
        let entity = match obstacle.kind {
            ObstacleKind::Tree => {
                let trunk_height = obstacle.top_height - ground.y;
                commands
                    .spawn((
                        ObstacleVisual,
                        Transform::from_translation(ground),
                        Visibility::default(),
                    ))
                    .with_children(|tree| {
                        tree.spawn((
                            Mesh3d(trunk_mesh.clone()),
                            MeshMaterial3d(trunk_material.clone()),
                            Transform::from_xyz(0.0, trunk_height * 0.5, 0.0)
                                .with_scale(Vec3::new(1.0, trunk_height, 1.0)),
                        ));
                        tree.spawn((
                            Mesh3d(canopy_mesh.clone()),
                            MeshMaterial3d(canopy_material.clone()),
                            Transform::from_xyz(0.0, trunk_height + 1.5, 0.0),
                        ));
                    })
                    .id()
            }
            ObstacleKind::Rock => {
                // Flattened sphere whose top sits at the walkable height
                let radius = obstacle.footprint_radius;
                let top = obstacle.top_height - ground.y;
                commands
                    .spawn((
                        ObstacleVisual,
                        Mesh3d(rock_mesh.clone()),
                        MeshMaterial3d(rock_material.clone()),
                        Transform::from_translation(ground + Vec3::Y * (top * 0.5))
                            .with_scale(Vec3::new(radius, top * 0.5, radius)),
                    ))
                    .id()
            }
        };
        commands.entity(world_root).add_child(entity);
    }

    info!("Spawned terrain and {} obstacle visuals", obstacles.0.len());
}
