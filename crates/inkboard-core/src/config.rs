//! Engine tunables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Thresholds, limits and timings used by the interaction and sync layers.
///
/// Pixel values are screen pixels and are divided by the camera zoom
/// before being compared against board coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Minimum spacing between live gesture broadcasts.
    pub broadcast_interval_ms: u64,
    /// Pointer travel that turns a click on empty space into a marquee.
    pub marquee_threshold_px: f64,
    /// Drag distance below which a creation gesture counts as a click.
    pub create_min_distance_px: f64,
    /// Search radius for connector anchor snapping.
    pub snap_distance_px: f64,
    /// Hit tolerance around line paths.
    pub line_hit_tolerance_px: f64,
    /// Side length of square manipulation handles.
    pub handle_size_px: f64,
    /// Distance of the rotate handle above the top edge.
    pub rotate_handle_offset_px: f64,
    /// Height of the frame title label.
    pub frame_label_height_px: f64,
    /// Padding added around obstacles for orthogonal routing.
    pub route_clearance: f64,
    pub min_arrow: f64,
    pub max_arrow: f64,
    /// Rotation snaps to a multiple of 90° when this close (radians).
    pub rotate_snap_epsilon: f64,
    pub history_limit: usize,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Place a default-size element when a creation tool is clicked without dragging.
    pub place_on_click: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 8.0,
            broadcast_interval_ms: 50,
            marquee_threshold_px: 4.0,
            create_min_distance_px: 6.0,
            snap_distance_px: 16.0,
            line_hit_tolerance_px: 8.0,
            handle_size_px: 10.0,
            rotate_handle_offset_px: 24.0,
            frame_label_height_px: 22.0,
            route_clearance: 16.0,
            min_arrow: 6.0,
            max_arrow: 24.0,
            rotate_snap_epsilon: 0.08,
            history_limit: 100,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            place_on_click: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(ConfigError::Invalid {
                field: "minZoom",
                reason: format!("must be in (0, {}]", self.max_zoom),
            });
        }
        if self.min_arrow < 0.0 || self.min_arrow > self.max_arrow {
            return Err(ConfigError::Invalid {
                field: "minArrow",
                reason: format!("must be in [0, {}]", self.max_arrow),
            });
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(ConfigError::Invalid {
                field: "reconnectInitialMs",
                reason: format!("must be in [1, {}]", self.reconnect_max_ms),
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "historyLimit",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
