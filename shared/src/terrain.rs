//! Procedural terrain height field
//! Uses deterministic noise so every peer builds identical terrain from the same settings
//!
//! Scale: 1 unit = 1 meter
//! - The field is a square centered on the origin
//! - Heights are sampled once into a vertex grid at build time
//! - Runtime queries blend that grid, so they match the rendered mesh exactly

use bevy::prelude::*;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Terrain generation seed - same seed = same world
pub const TERRAIN_SEED: u32 = 42;

/// Side length of the terrain square (meters)
pub const TERRAIN_EXTENT: f32 = 500.0;
/// Number of grid segments per side
pub const TERRAIN_RESOLUTION: usize = 128;
/// Peak height variation (meters)
pub const TERRAIN_HEIGHT_SCALE: f32 = 20.0;

/// Octave frequencies and weights of the elevation function
const OCTAVES: [(f64, f32); 3] = [(1.0, 0.5), (2.0, 0.3), (4.0, 0.2)];

/// Build parameters for a [`HeightField`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainSettings {
    pub extent: f32,
    pub resolution: usize,
    pub height_scale: f32,
    pub seed: u32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            extent: TERRAIN_EXTENT,
            resolution: TERRAIN_RESOLUTION,
            height_scale: TERRAIN_HEIGHT_SCALE,
            seed: TERRAIN_SEED,
        }
    }
}

/// Immutable terrain elevation grid.
///
/// Vertex `(ix, iz)` lives at `(-extent/2 + ix * cell, -extent/2 + iz * cell)`
/// for `ix, iz` in `0..=resolution`. Heights are stored row-major by `iz`.
#[derive(Debug, Clone)]
pub struct HeightField {
    settings: TerrainSettings,
    noise: Perlin,
    cell_size: f32,
    heights: Vec<f32>,
}

impl HeightField {
    /// Sample the vertex grid once. A zero resolution is treated as one segment.
    pub fn build(settings: TerrainSettings) -> Self {
        let settings = TerrainSettings {
            resolution: settings.resolution.max(1),
            ..settings
        };
        let cell_size = settings.extent / settings.resolution as f32;
        let mut field = Self {
            settings,
            noise: Perlin::new(settings.seed),
            cell_size,
            heights: Vec::new(),
        };

        let side = settings.resolution + 1;
        let mut heights = Vec::with_capacity(side * side);
        for iz in 0..side {
            for ix in 0..side {
                let p = field.vertex_xz(ix, iz);
                heights.push(field.elevation(p.x, p.y));
            }
        }
        field.heights = heights;
        field
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn extent(&self) -> f32 {
        self.settings.extent
    }

    pub fn resolution(&self) -> usize {
        self.settings.resolution
    }

    /// Distance between neighbouring grid vertices
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Raw noise elevation at a world position (not the grid).
    ///
    /// Three octaves evaluated at `(x / extent, z / extent)`, scaled by `height_scale`.
    pub fn elevation(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.settings.extent) as f64;
        let nz = (z / self.settings.extent) as f64;
        let mut height = 0.0;
        for (frequency, weight) in OCTAVES {
            height += self.noise.get([nx * frequency, nz * frequency]) as f32 * weight;
        }
        height * self.settings.height_scale
    }

    fn vertex_xz(&self, ix: usize, iz: usize) -> Vec2 {
        let half = self.settings.extent * 0.5;
        Vec2::new(
            -half + ix as f32 * self.cell_size,
            -half + iz as f32 * self.cell_size,
        )
    }

    #[inline]
    fn index(&self, ix: usize, iz: usize) -> usize {
        iz * (self.settings.resolution + 1) + ix
    }

    /// Stored elevation of grid vertex `(ix, iz)`. Indices past the edge are clamped.
    pub fn vertex_height(&self, ix: usize, iz: usize) -> f32 {
        let res = self.settings.resolution;
        self.heights[self.index(ix.min(res), iz.min(res))]
    }

    /// World position of grid vertex `(ix, iz)`
    pub fn vertex_position(&self, ix: usize, iz: usize) -> Vec3 {
        let res = self.settings.resolution;
        let (ix, iz) = (ix.min(res), iz.min(res));
        let p = self.vertex_xz(ix, iz);
        Vec3::new(p.x, self.vertex_height(ix, iz), p.y)
    }

    /// Terrain height at a world position, bilinearly blended from the vertex grid.
    ///
    /// Cell indices are clamped to `[0, resolution - 1]` and the offset within the
    /// cell to `[0, 1]`, so positions off the field read the nearest edge height.
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let res = self.settings.resolution;
        let half = self.settings.extent * 0.5;

        let gx = (x + half) / self.cell_size;
        let gz = (z + half) / self.cell_size;

        // `as usize` saturates: negatives and NaN land on 0
        let x1 = (gx.floor() as usize).min(res - 1);
        let z1 = (gz.floor() as usize).min(res - 1);
        let x2 = x1 + 1;
        let z2 = z1 + 1;

        // max/min rather than clamp so a NaN offset falls to 0
        let fx = (gx - x1 as f32).max(0.0).min(1.0);
        let fz = (gz - z1 as f32).max(0.0).min(1.0);

        let h11 = self.heights[self.index(x1, z1)];
        let h21 = self.heights[self.index(x2, z1)];
        let h12 = self.heights[self.index(x1, z2)];
        let h22 = self.heights[self.index(x2, z2)];

        let near = h11 * (1.0 - fx) + h21 * fx;
        let far = h12 * (1.0 - fx) + h22 * fx;
        near * (1.0 - fz) + far * fz
    }

    /// Build render data from the same vertex grid the queries use
    pub fn mesh_data(&self) -> TerrainMeshData {
        let res = self.settings.resolution;
        let side = res + 1;
        let mut positions = Vec::with_capacity(side * side);
        let mut normals = Vec::with_capacity(side * side);
        let mut uvs = Vec::with_capacity(side * side);
        let mut indices = Vec::with_capacity(res * res * 6);

        for iz in 0..side {
            for ix in 0..side {
                let p = self.vertex_position(ix, iz);
                positions.push([p.x, p.y, p.z]);
                uvs.push([ix as f32 / res as f32, iz as f32 / res as f32]);

                let h_left = self.vertex_height(ix.saturating_sub(1), iz);
                let h_right = self.vertex_height(ix + 1, iz);
                let h_down = self.vertex_height(ix, iz.saturating_sub(1));
                let h_up = self.vertex_height(ix, iz + 1);
                let normal =
                    Vec3::new(h_left - h_right, 2.0 * self.cell_size, h_down - h_up).normalize();
                normals.push([normal.x, normal.y, normal.z]);
            }
        }

        for iz in 0..res {
            for ix in 0..res {
                let top_left = (iz * side + ix) as u32;
                let top_right = top_left + 1;
                let bottom_left = top_left + side as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[top_left, bottom_left, top_right]);
                indices.extend_from_slice(&[top_right, bottom_left, bottom_right]);
            }
        }

        TerrainMeshData {
            positions,
            normals,
            uvs,
            indices,
        }
    }
}

/// Generated mesh data for the terrain
pub struct TerrainMeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

/// Resource holding the height field, if one has been built.
///
/// Consumers query through [`WorldTerrain::height_at`], which reads 0.0 while the
/// field is missing instead of failing.
#[derive(Resource, Debug, Clone, Default)]
pub struct WorldTerrain {
    pub field: Option<HeightField>,
}

impl WorldTerrain {
    pub fn new(field: HeightField) -> Self {
        Self { field: Some(field) }
    }

    pub fn build(settings: TerrainSettings) -> Self {
        let field = HeightField::build(settings);
        info!(
            "Built height field: extent {}m, {}x{} segments, seed {}",
            settings.extent, field.resolution(), field.resolution(), settings.seed
        );
        Self::new(field)
    }

    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.field.as_ref().map_or(0.0, |field| field.sample(x, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> HeightField {
        HeightField::build(TerrainSettings {
            extent: 128.0,
            resolution: 16,
            height_scale: 20.0,
            seed: 7,
        })
    }

    #[test]
    fn test_sample_is_deterministic() {
        let field = small_field();
        let rebuilt = small_field();
        for &(x, z) in &[(0.0, 0.0), (13.7, -42.1), (-63.9, 63.9), (5.5, 5.5)] {
            let a = field.sample(x, z);
            assert_eq!(a.to_bits(), field.sample(x, z).to_bits());
            assert_eq!(a.to_bits(), rebuilt.sample(x, z).to_bits());
        }
    }

    #[test]
    fn test_sample_at_vertices_matches_grid() {
        let field = small_field();
        for iz in 0..=16 {
            for ix in 0..=16 {
                let p = field.vertex_position(ix, iz);
                assert_eq!(field.sample(p.x, p.z), field.vertex_height(ix, iz));
            }
        }
    }

    #[test]
    fn test_grid_stores_elevation() {
        let field = small_field();
        let p = field.vertex_position(3, 9);
        assert_eq!(field.vertex_height(3, 9), field.elevation(p.x, p.z));
    }

    #[test]
    fn test_sample_blends_between_vertices() {
        let field = small_field();
        let a = field.vertex_position(4, 4);
        let b = field.vertex_position(5, 4);
        let mid = field.sample((a.x + b.x) * 0.5, a.z);
        let expected = (a.y + b.y) * 0.5;
        assert!((mid - expected).abs() < 1e-4);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let field = small_field();
        let corner = field.vertex_height(0, 0);
        assert_eq!(field.sample(-1000.0, -1000.0), corner);
        let far = field.vertex_height(16, 16);
        assert_eq!(field.sample(1000.0, 1000.0), far);
        assert!(field.sample(f32::NAN, 0.0).is_finite());
    }

    #[test]
    fn test_missing_field_reads_zero() {
        let terrain = WorldTerrain::default();
        assert_eq!(terrain.height_at(10.0, -3.0), 0.0);
    }

    #[test]
    fn test_mesh_data_shape() {
        let field = small_field();
        let mesh = field.mesh_data();
        assert_eq!(mesh.positions.len(), 17 * 17);
        assert_eq!(mesh.indices.len(), 16 * 16 * 6);
        assert_eq!(mesh.positions[0][1], field.vertex_height(0, 0));
    }
}
