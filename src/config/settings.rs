//! Tunable settings for the individual components
//!
//! Each component takes its own settings struct so it can be constructed and
//! tested in isolation. All of them deserialize with `#[serde(default)]`, so a
//! partial TOML section only overrides the keys it names.
//!
//! # Main Types
//!
//! - [`TopologySettings`] - Neighborhood size cap and canvas dimensions
//! - [`LayoutSettings`] - Hierarchical placement geometry
//! - [`RelaxationSettings`] - Force parameters and the relaxation window
//! - [`CorrelationSettings`] - Alarm filtering, telemetry parallelism and rule thresholds
//! - [`SessionSettings`] - Analysis protocol timeouts

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound on the number of nodes in a neighborhood
pub const DEFAULT_MAX_NEIGHBORHOOD: usize = 50;

/// Default canvas size used when the caller does not supply one
pub const DEFAULT_CANVAS_WIDTH: f64 = 800.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

/// Default analysis submission timeout in milliseconds
pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 10_000;

/// Default time allowed for a terminal stream frame in milliseconds
pub const DEFAULT_STREAM_TIMEOUT_MS: u64 = 120_000;

/// Default timeout of the non-streaming fallback request in milliseconds
pub const DEFAULT_FALLBACK_TIMEOUT_MS: u64 = 30_000;

// ==================== Topology ====================

/// Graph builder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Maximum number of nodes visited by the BFS
    pub max_neighborhood: usize,

    /// Canvas width in layout units
    pub canvas_width: f64,

    /// Canvas height in layout units
    pub canvas_height: f64,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            max_neighborhood: DEFAULT_MAX_NEIGHBORHOOD,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

// ==================== Layout ====================

/// Deterministic placement geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Horizontal gap between successive levels
    pub level_gap: f64,

    /// Radial distance of the first node of a fan group
    pub min_distance: f64,

    /// Distance between successive nodes of a group
    pub equipment_spacing: f64,

    /// Upper bound on the fan's half spread, in degrees
    pub max_angle_deg: f64,

    /// Fan spread contributed by each field group, in degrees
    pub angle_per_group_deg: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            level_gap: 400.0,
            min_distance: 100.0,
            equipment_spacing: 50.0,
            max_angle_deg: 50.0,
            angle_per_group_deg: 15.0,
        }
    }
}

// ==================== Relaxation ====================

/// Force-directed refinement settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationSettings {
    /// Whether the relaxation pass runs at all
    pub enabled: bool,

    /// Smallest node count that is relaxed (exclusive)
    pub min_nodes_exclusive: usize,

    /// Largest node count that is relaxed (inclusive)
    pub max_nodes: usize,

    /// Rest length of link springs
    pub link_distance: f64,

    /// Spring strength
    pub link_strength: f64,

    /// Many-body strength (negative repels)
    pub charge_strength: f64,

    /// Pull toward the canvas center
    pub center_strength: f64,

    /// Collision radius per node
    pub collision_radius: f64,

    /// Initial simulation temperature
    pub initial_alpha: f64,

    /// Temperature decay per tick
    pub alpha_decay: f64,

    /// Temperature at which the simulation stops on its own
    pub alpha_min: f64,

    /// Fraction of velocity lost per tick
    pub velocity_decay: f64,

    /// Wall-clock window after which positions are frozen
    pub window_ms: u64,
}

impl Default for RelaxationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_nodes_exclusive: 2,
            max_nodes: 20,
            link_distance: 150.0,
            link_strength: 0.8,
            charge_strength: -800.0,
            center_strength: 0.05,
            collision_radius: 40.0,
            initial_alpha: 0.1,
            alpha_decay: 0.02,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            window_ms: 800,
        }
    }
}

impl RelaxationSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Whether a graph of `node_count` nodes is inside the relaxation band
    pub fn applies_to(&self, node_count: usize) -> bool {
        self.enabled && node_count > self.min_nodes_exclusive && node_count <= self.max_nodes
    }
}

// ==================== Correlation ====================

/// Correlation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Only count alarms flagged valid as active
    pub valid_alarms_only: bool,

    /// Maximum telemetry checks in flight at once
    pub telemetry_concurrency: usize,

    /// `A1395` alarm count at or above which an exchange is declared failed
    pub a1395_mass_threshold: usize,

    /// `A1930` alarm count at or below which an isolated exchange fault is assumed
    pub a1930_standalone_max: usize,

    /// Confidence attached to line and MW link classifications
    pub link_confidence: f32,

    /// Confidence attached to upstream-node classifications
    pub upstream_confidence: f32,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            valid_alarms_only: false,
            telemetry_concurrency: 1,
            a1395_mass_threshold: 100,
            a1930_standalone_max: 10,
            link_confidence: 0.9,
            upstream_confidence: 0.8,
        }
    }
}

// ==================== Session ====================

/// Analysis session protocol timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub submit_timeout_ms: u64,
    pub stream_timeout_ms: u64,
    pub fallback_timeout_ms: u64,
    /// Capacity of the event channel relayed to the caller
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            submit_timeout_ms: DEFAULT_SUBMIT_TIMEOUT_MS,
            stream_timeout_ms: DEFAULT_STREAM_TIMEOUT_MS,
            fallback_timeout_ms: DEFAULT_FALLBACK_TIMEOUT_MS,
            event_capacity: 256,
        }
    }
}

impl SessionSettings {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxation_band() {
        let settings = RelaxationSettings::default();
        assert!(!settings.applies_to(1));
        assert!(!settings.applies_to(2));
        assert!(settings.applies_to(3));
        assert!(settings.applies_to(20));
        assert!(!settings.applies_to(21));
    }

    #[test]
    fn test_relaxation_disabled() {
        let settings = RelaxationSettings {
            enabled: false,
            ..Default::default()
        };
        assert!(!settings.applies_to(5));
    }

    #[test]
    fn test_session_durations() {
        let settings = SessionSettings::default();
        assert_eq!(settings.submit_timeout(), Duration::from_secs(10));
        assert_eq!(settings.stream_timeout(), Duration::from_secs(120));
        assert_eq!(settings.fallback_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let settings: LayoutSettings = toml::from_str("level_gap = 250.0").unwrap();
        assert_eq!(settings.level_gap, 250.0);
        assert_eq!(settings.min_distance, 100.0);
    }
}
