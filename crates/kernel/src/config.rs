use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use worldlink_common::Vector3;

use crate::error::SyncError;

/// Engine configuration.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Network frame rate: local samples per second and the length of remote
    /// motion interpolation.
    pub fps: u32,
    /// Per-axis movement tolerance, in units or radians.
    pub tolerance: f32,
    pub track_rotation: bool,
    /// Applied to video and mesh entities that arrive at the origin.
    pub default_position: Vector3,
    pub default_rotation: Vector3,
    /// Interpolate remote motion. When off, values are applied immediately.
    pub create_animations: bool,
    /// Forward local log events to the server once a world is entered.
    pub remote_logging: bool,
    /// Passed verbatim to the video avatar factory.
    pub custom_options: Option<serde_json::Value>,
    pub server_url: String,
    /// World to enter after connecting. `None` starts a session wherever the
    /// server puts us.
    pub world_name: Option<String>,
    pub auto_publish_video: bool,
    /// Height sent to avatar loaders for entities that declare none.
    pub default_user_height: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fps: 5,
            tolerance: 0.01,
            track_rotation: true,
            default_position: Vector3::new(1000.0, 1000.0, 1000.0),
            default_rotation: Vector3::ZERO,
            create_animations: true,
            remote_logging: false,
            custom_options: None,
            server_url: "ws://localhost:8080/vrspace".to_string(),
            world_name: None,
            auto_publish_video: false,
            default_user_height: 1.8,
        }
    }
}

impl SyncConfig {
    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.fps == 0 {
            return Err(SyncError::Config("fps must be positive".into()));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(SyncError::Config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Time between two samples.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}
