//! Simulation tunables, loadable from RON.
//!
//! Every field has a default, so a config file only needs the values it overrides:
//!
//! ```ron
//! (
//!     terrain: (extent: 300.0, resolution: 96, height_scale: 12.0, seed: 7),
//!     locomotion: (gravity: 25.0, jump_impulse: 11.0, crouch_jump_impulse: 7.0,
//!                  run_speed: 9.0, crouch_speed: 4.0, turn_speed: 10.0),
//! )
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::interpolation::INTERPOLATION_DELAY_MS;
use crate::locomotion::LocomotionConfig;
use crate::obstacles::VegetationSettings;
use crate::terrain::TerrainSettings;

/// Default config file name, looked up in the working directory
pub const SIM_CONFIG_FILE: &str = "grove.ron";

/// Largest accepted terrain grid; the vertex grid holds `(resolution + 1)^2` heights
pub const MAX_TERRAIN_RESOLUTION: usize = 4096;

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub terrain: TerrainSettings,
    pub vegetation: VegetationSettings,
    pub locomotion: LocomotionConfig,
    pub interpolation_delay_ms: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainSettings::default(),
            vegetation: VegetationSettings::default(),
            locomotion: LocomotionConfig::default(),
            interpolation_delay_ms: INTERPOLATION_DELAY_MS,
        }
    }
}

impl SimConfig {
    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if !(self.terrain.extent.is_finite() && self.terrain.extent > 0.0) {
            return Err(format!("terrain.extent must be positive, got {}", self.terrain.extent));
        }
        if self.terrain.resolution > MAX_TERRAIN_RESOLUTION {
            return Err(format!(
                "terrain.resolution must be at most {MAX_TERRAIN_RESOLUTION}, got {}",
                self.terrain.resolution
            ));
        }
        if !self.terrain.height_scale.is_finite() {
            return Err("terrain.height_scale must be finite".to_string());
        }
        if !(self.interpolation_delay_ms.is_finite() && self.interpolation_delay_ms >= 0.0) {
            return Err(format!(
                "interpolation_delay_ms must be non-negative, got {}",
                self.interpolation_delay_ms
            ));
        }
        let l = &self.locomotion;
        for (name, value) in [
            ("gravity", l.gravity),
            ("run_speed", l.run_speed),
            ("crouch_speed", l.crouch_speed),
            ("turn_speed", l.turn_speed),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("locomotion.{name} must be non-negative, got {value}"));
            }
        }
        Ok(())
    }
}

/// Parse and validate a RON config
pub fn load_sim_config_from_str(text: &str) -> Result<SimConfig, String> {
    let config: SimConfig = ron::from_str(text).map_err(|e| format!("RON parse failed: {e}"))?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a RON config file
pub fn load_sim_config_from_file(path: impl AsRef<Path>) -> Result<SimConfig, String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {path:?}: {e}"))?;
    load_sim_config_from_str(&text)
}

/// Load `path` if it exists, otherwise (or on error) use the defaults
pub fn load_sim_config_or_default(path: impl AsRef<Path>) -> SimConfig {
    let path = path.as_ref();
    if !path.exists() {
        info!("No {path:?}; using default simulation config");
        return SimConfig::default();
    }
    match load_sim_config_from_file(path) {
        Ok(config) => {
            info!("Loaded simulation config from {path:?}");
            config
        }
        Err(e) => {
            warn!("Ignoring simulation config: {e}");
            SimConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(load_sim_config_from_str("()").unwrap(), SimConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = load_sim_config_from_str(
            "(terrain: (extent: 300.0, resolution: 96, height_scale: 12.0, seed: 7), interpolation_delay_ms: 150.0)",
        )
        .unwrap();
        assert_eq!(config.terrain.extent, 300.0);
        assert_eq!(config.terrain.resolution, 96);
        assert_eq!(config.interpolation_delay_ms, 150.0);
        assert_eq!(config.locomotion, LocomotionConfig::default());
        assert_eq!(config.vegetation, VegetationSettings::default());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = load_sim_config_from_str("(terrain: ").unwrap_err();
        assert!(err.starts_with("RON parse failed"), "{err}");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load_sim_config_from_str("(interpolation_delay_ms: -5.0)").unwrap_err();
        assert!(err.contains("interpolation_delay_ms"));
        let err = load_sim_config_from_str(
            "(locomotion: (gravity: -1.0, jump_impulse: 10.0, crouch_jump_impulse: 7.0, run_speed: 10.0, crouch_speed: 5.0, turn_speed: 10.0))",
        )
        .unwrap_err();
        assert!(err.contains("gravity"));
    }

    #[test]
    fn test_oversized_terrain_is_rejected() {
        let err = load_sim_config_from_str("(terrain: (extent: 500.0, resolution: 100000, height_scale: 20.0, seed: 42))")
            .unwrap_err();
        assert!(err.contains("terrain.resolution"));
        assert!(load_sim_config_from_str("(terrain: (extent: 500.0, resolution: 4096, height_scale: 20.0, seed: 42))").is_ok());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = load_sim_config_or_default("definitely/not/here/grove.ron");
        assert_eq!(config, SimConfig::default());
        assert!(load_sim_config_from_file("definitely/not/here/grove.ron").is_err());
    }
}
