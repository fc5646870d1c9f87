//! Hierarchical layout of topology snapshots
//!
//! Placement happens in two phases:
//!
//! 1. [`LayoutEngine::apply`] assigns deterministic coordinates. The target is
//!    pinned at the canvas center, upstream levels extend to the right and
//!    downstream levels to the left, and nodes sharing a level are grouped by
//!    field into a symmetric fan. The whole drawing is then shifted so its
//!    bounding box is centered on the canvas.
//! 2. [`Relaxation`] optionally refines mid-sized graphs with a short,
//!    time-boxed force simulation driven by the caller's frame loop.
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::layout::{Canvas, LayoutEngine, Relaxation};
//!
//! let engine = LayoutEngine::new(config.layout.clone());
//! let canvas = Canvas::default();
//! engine.apply(&mut graph, canvas);
//!
//! if let Some(mut relax) = Relaxation::start(&graph, config.relaxation.clone(), canvas.center(), Instant::now()) {
//!     while relax.tick(&mut graph, Instant::now()).is_running() {
//!         // render a frame
//!     }
//! }
//! ```

pub mod relaxation;

pub use relaxation::{Relaxation, RelaxationState, StopReason};

use crate::config::{LayoutSettings, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
use crate::topology::TopologyGraph;
use crate::types::{Direction, Point};
use std::collections::BTreeMap;

/// Drawing area in layout units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Deterministic hierarchical placement
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    settings: LayoutSettings,
}

impl LayoutEngine {
    pub fn new(settings: LayoutSettings) -> Self {
        Self { settings }
    }

    /// Assign coordinates to every node of `graph`
    pub fn apply(&self, graph: &mut TopologyGraph, canvas: Canvas) {
        let center = canvas.center();

        // (level, upstream) -> node indices in BFS order
        let mut buckets: BTreeMap<(u32, bool), Vec<usize>> = BTreeMap::new();
        for (i, node) in graph.nodes.iter_mut().enumerate() {
            if node.is_target || node.level == 0 {
                node.pin_at(center);
                continue;
            }
            node.pinned = None;
            buckets
                .entry((node.level, node.direction == Direction::Up))
                .or_default()
                .push(i);
        }

        for ((level, upstream), members) in buckets {
            let outward = if upstream { 1.0 } else { -1.0 };
            let anchor = Point::new(
                center.x + outward * level as f64 * self.settings.level_gap,
                center.y,
            );

            for (i, position) in self.place_bucket(graph, &members, anchor, outward) {
                graph.nodes[i].position = position;
            }
        }

        center_on(graph, center);
    }

    fn place_bucket(
        &self,
        graph: &TopologyGraph,
        members: &[usize],
        anchor: Point,
        outward: f64,
    ) -> Vec<(usize, Point)> {
        if members.len() == 1 {
            return vec![(members[0], anchor)];
        }

        let mut groups: BTreeMap<&'static str, Vec<usize>> = BTreeMap::new();
        for &i in members {
            groups.entry(graph.nodes[i].field.as_str()).or_default().push(i);
        }

        if groups.len() == 1 {
            let spacing = self.settings.equipment_spacing;
            let offset = (members.len() as f64 - 1.0) / 2.0;
            return members
                .iter()
                .enumerate()
                .map(|(j, &i)| (i, Point::new(anchor.x, anchor.y + (j as f64 - offset) * spacing)))
                .collect();
        }

        let spread = (groups.len() as f64 * self.settings.angle_per_group_deg)
            .min(self.settings.max_angle_deg);
        let angles = symmetric_angles(groups.len(), spread);

        groups
            .values()
            .zip(angles)
            .flat_map(|(group, angle)| {
                let (sin, cos) = angle.to_radians().sin_cos();
                group.iter().enumerate().map(move |(j, &i)| {
                    let d = self.settings.min_distance + j as f64 * self.settings.equipment_spacing;
                    (i, Point::new(anchor.x + outward * d * cos, anchor.y + d * sin))
                })
            })
            .collect()
    }
}

/// Fan angles in degrees for `count` groups, mirrored around 0 and sorted ascending
pub fn symmetric_angles(count: usize, max_spread: f64) -> Vec<f64> {
    if count <= 1 {
        return vec![0.0; count];
    }

    let half = count / 2;
    let step = max_spread / half as f64;
    let mut angles = Vec::with_capacity(count);

    if count % 2 == 1 {
        angles.push(0.0);
        for i in 1..=half {
            angles.push(step * i as f64);
            angles.push(-step * i as f64);
        }
    } else {
        for i in 1..=half {
            angles.push(step * (i as f64 - 0.5));
            angles.push(-step * (i as f64 - 0.5));
        }
    }

    angles.sort_by(|a, b| a.total_cmp(b));
    angles
}

/// Translate `graph` so its bounding box is centered on `center`
pub fn center_on(graph: &mut TopologyGraph, center: Point) {
    if graph.node_count() <= 1 {
        return;
    }
    if let Some((min, max)) = graph.bounding_box() {
        let dx = center.x - (min.x + max.x) / 2.0;
        let dy = center.y - (min.y + max.y) / 2.0;
        graph.translate(dx, dy);
    }
}
