//! Static obstacles (trees and rocks) and the collision queries against them.
//!
//! Obstacles are placed once when the world is built and never move. The world only
//! holds tens of them, so every query is a linear scan in placement order: all trees
//! first, then all rocks. When several obstacles match, the first one in that order wins.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::terrain::HeightField;

/// Footprint radius of every tree trunk (meters)
pub const TREE_FOOTPRINT_RADIUS: f32 = 1.0;
/// Trunk height above the ground; a tree's top is ground + this
pub const TREE_TRUNK_HEIGHT: f32 = 2.0;
/// Rock scale range; a rock's footprint and height above ground both equal its scale
pub const ROCK_SCALE_MIN: f32 = 0.5;
pub const ROCK_SCALE_MAX: f32 = 2.0;

/// An avatar whose feet are more than this far below an obstacle top is blocked by it
pub const BLOCK_STEP_MARGIN: f32 = 0.3;
/// Feet within this distance of an obstacle top count as standing on it
pub const STAND_TOLERANCE: f32 = 0.5;

/// Obstacles are scattered within this fraction of the terrain extent
pub const PLACEMENT_FRACTION: f32 = 0.8;

pub const DEFAULT_TREE_COUNT: usize = 100;
pub const DEFAULT_ROCK_COUNT: usize = 50;
pub const VEGETATION_SEED: u64 = 1337;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleKind {
    Tree,
    Rock,
}

/// A static collidable object anchored on the terrain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollidableObject {
    /// Ground anchor: x/z of the object, y = terrain height at spawn
    pub position: Vec3,
    pub kind: ObstacleKind,
    /// Horizontal collision radius
    pub footprint_radius: f32,
    /// Absolute world height of the walkable top
    pub top_height: f32,
    /// Visual scale (1.0 for trees)
    pub scale: f32,
}

impl CollidableObject {
    pub fn tree(ground: Vec3) -> Self {
        Self {
            position: ground,
            kind: ObstacleKind::Tree,
            footprint_radius: TREE_FOOTPRINT_RADIUS,
            top_height: ground.y + TREE_TRUNK_HEIGHT,
            scale: 1.0,
        }
    }

    pub fn rock(ground: Vec3, scale: f32) -> Self {
        Self {
            position: ground,
            kind: ObstacleKind::Rock,
            footprint_radius: scale,
            top_height: ground.y + scale,
            scale,
        }
    }

    /// Horizontal (XZ) distance from this obstacle to a point
    #[inline]
    pub fn horizontal_distance(&self, point: Vec3) -> f32 {
        Vec2::new(self.position.x - point.x, self.position.z - point.z).length()
    }

    /// Footprints of the avatar and the obstacle overlap in the XZ plane
    #[inline]
    pub fn overlaps(&self, point: Vec3, body: &BodyShape) -> bool {
        self.horizontal_distance(point) < body.radius + self.footprint_radius
    }

    /// The obstacle rises too far above the avatar's feet to walk into it
    pub fn blocks(&self, point: Vec3, body: &BodyShape) -> bool {
        self.overlaps(point, body) && body.bottom(point.y) < self.top_height - BLOCK_STEP_MARGIN
    }

    /// The avatar's feet rest on the obstacle's top. Never true while ascending.
    pub fn supports(&self, point: Vec3, body: &BodyShape, vertical_velocity: f32) -> bool {
        vertical_velocity <= 0.0
            && self.overlaps(point, body)
            && (body.bottom(point.y) - self.top_height).abs() < STAND_TOLERANCE
    }
}

/// Collision shape of an avatar: a vertical cylinder whose top is the tracked position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyShape {
    pub radius: f32,
    pub height: f32,
}

impl BodyShape {
    /// Y of the avatar's feet given its tracked (top) position
    #[inline]
    pub fn bottom(&self, y: f32) -> f32 {
        y - self.height
    }
}

/// How many obstacles to scatter and with which seed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegetationSettings {
    pub tree_count: usize,
    pub rock_count: usize,
    pub seed: u64,
}

impl Default for VegetationSettings {
    fn default() -> Self {
        Self {
            tree_count: DEFAULT_TREE_COUNT,
            rock_count: DEFAULT_ROCK_COUNT,
            seed: VEGETATION_SEED,
        }
    }
}

/// Flat, ordered collection of static obstacles
#[derive(Debug, Clone, Default)]
pub struct CollisionIndex {
    obstacles: Vec<CollidableObject>,
}

impl CollisionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_obstacles(obstacles: Vec<CollidableObject>) -> Self {
        Self { obstacles }
    }

    /// Scatter trees, then rocks, at seeded random positions on the height field.
    ///
    /// Every peer that scatters with the same settings over the same field gets the
    /// same obstacles in the same order.
    pub fn scatter(field: &HeightField, settings: &VegetationSettings) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let half_span = field.extent() * PLACEMENT_FRACTION * 0.5;
        let mut index = Self::new();

        let mut ground_point = |rng: &mut StdRng| {
            let x = rng.gen_range(-half_span..half_span);
            let z = rng.gen_range(-half_span..half_span);
            Vec3::new(x, field.sample(x, z), z)
        };

        for _ in 0..settings.tree_count {
            let ground = ground_point(&mut rng);
            index.push(CollidableObject::tree(ground));
        }
        for _ in 0..settings.rock_count {
            let ground = ground_point(&mut rng);
            let scale = rng.gen_range(ROCK_SCALE_MIN..ROCK_SCALE_MAX);
            index.push(CollidableObject::rock(ground, scale));
        }

        info!(
            "Scattered {} trees and {} rocks (seed {})",
            settings.tree_count, settings.rock_count, settings.seed
        );
        index
    }

    pub fn push(&mut self, obstacle: CollidableObject) {
        self.obstacles.push(obstacle);
    }

    /// Candidate obstacles for a query point.
    ///
    /// This is every obstacle, in placement order; callers rely on that order
    /// to pick the first match.
    pub fn obstacles_near(&self, _position: Vec3) -> impl Iterator<Item = &CollidableObject> {
        self.obstacles.iter()
    }

    /// First obstacle that blocks horizontal movement at `position`
    pub fn blocking_obstacle(&self, position: Vec3, body: &BodyShape) -> Option<&CollidableObject> {
        self.obstacles_near(position).find(|o| o.blocks(position, body))
    }

    /// Top height of the first obstacle the avatar is standing on, if any
    pub fn standing_surface(&self, position: Vec3, body: &BodyShape, vertical_velocity: f32) -> Option<f32> {
        self.obstacles_near(position)
            .find(|o| o.supports(position, body, vertical_velocity))
            .map(|o| o.top_height)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollidableObject> {
        self.obstacles.iter()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// Resource holding the world's static obstacles
#[derive(Resource, Debug, Clone, Default)]
pub struct WorldObstacles(pub CollisionIndex);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainSettings;

    const BODY: BodyShape = BodyShape { radius: 0.5, height: 1.8 };

    fn pillar() -> CollidableObject {
        // footprint 1.0, top 3.0, anchored at the origin
        CollidableObject {
            position: Vec3::ZERO,
            kind: ObstacleKind::Tree,
            footprint_radius: 1.0,
            top_height: 3.0,
            scale: 1.0,
        }
    }

    #[test]
    fn test_low_avatar_is_blocked() {
        let index = CollisionIndex::from_obstacles(vec![pillar()]);
        // feet at 1.0 < 3.0 - 0.3
        let pos = Vec3::new(1.2, 1.0 + BODY.height, 0.0);
        assert!(index.blocking_obstacle(pos, &BODY).is_some());
        assert!(index.standing_surface(pos, &BODY, -1.0).is_none());
    }

    #[test]
    fn test_falling_avatar_lands_on_top() {
        let index = CollisionIndex::from_obstacles(vec![pillar()]);
        // feet at 2.9, within tolerance of the top and above the block margin
        let pos = Vec3::new(0.4, 2.9 + BODY.height, 0.2);
        assert!(index.blocking_obstacle(pos, &BODY).is_none());
        assert_eq!(index.standing_surface(pos, &BODY, -2.0), Some(3.0));
    }

    #[test]
    fn test_ascending_avatar_never_stands() {
        let index = CollisionIndex::from_obstacles(vec![pillar()]);
        let pos = Vec3::new(0.0, 2.9 + BODY.height, 0.0);
        assert!(index.standing_surface(pos, &BODY, 0.5).is_none());
        assert_eq!(index.standing_surface(pos, &BODY, 0.0), Some(3.0));
    }

    #[test]
    fn test_no_overlap_outside_combined_radius() {
        let index = CollisionIndex::from_obstacles(vec![pillar()]);
        let pos = Vec3::new(1.5, 1.0 + BODY.height, 0.0);
        assert!(index.blocking_obstacle(pos, &BODY).is_none());
    }

    #[test]
    fn test_first_match_wins_in_placement_order() {
        let low = CollidableObject::rock(Vec3::new(0.5, 0.0, 0.0), 1.0);
        let high = CollidableObject {
            top_height: 1.2,
            ..CollidableObject::rock(Vec3::new(-0.5, 0.2, 0.0), 1.0)
        };
        let index = CollisionIndex::from_obstacles(vec![low, high]);
        let pos = Vec3::new(0.0, 1.1 + BODY.height, 0.0);
        assert_eq!(index.standing_surface(pos, &BODY, -1.0), Some(1.0));

        let swapped = CollisionIndex::from_obstacles(vec![high, low]);
        assert_eq!(swapped.standing_surface(pos, &BODY, -1.0), Some(1.2));
    }

    #[test]
    fn test_scatter_is_deterministic_and_grounded() {
        let field = HeightField::build(TerrainSettings {
            extent: 200.0,
            resolution: 32,
            height_scale: 10.0,
            seed: 3,
        });
        let settings = VegetationSettings { tree_count: 10, rock_count: 5, seed: 99 };
        let a = CollisionIndex::scatter(&field, &settings);
        let b = CollisionIndex::scatter(&field, &settings);

        assert_eq!(a.len(), 15);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x, y);
        }
        for o in a.iter() {
            assert!(o.position.x.abs() <= 80.0 && o.position.z.abs() <= 80.0);
            assert_eq!(o.position.y, field.sample(o.position.x, o.position.z));
        }
        assert!(a.iter().take(10).all(|o| o.kind == ObstacleKind::Tree));
        assert!(a.iter().skip(10).all(|o| {
            o.kind == ObstacleKind::Rock
                && (ROCK_SCALE_MIN..ROCK_SCALE_MAX).contains(&o.footprint_radius)
                && o.top_height == o.position.y + o.scale
        }));
    }
}
