//! Time-boxed force-directed refinement
//!
//! The simulation is advanced one step per rendered frame via [`Relaxation::tick`].
//! It applies link springs, many-body repulsion, a weak pull toward the canvas
//! center and a collision constraint, with a decaying temperature (`alpha`).
//! Pinned nodes never move. Once stopped, every node is pinned where it is.

use crate::config::RelaxationSettings;
use crate::topology::TopologyGraph;
use crate::types::Point;
use std::time::Instant;

/// Collision correction strength
const COLLISION_STRENGTH: f64 = 0.7;

/// Why a relaxation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The wall-clock window elapsed
    WindowElapsed,
    /// Alpha decayed below its floor
    Cooled,
    /// A different target was selected
    TargetChanged,
    /// The view was torn down
    ViewClosed,
    /// The user started dragging a node
    DragStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationState {
    Running,
    Stopped(StopReason),
}

impl RelaxationState {
    pub fn is_running(&self) -> bool {
        matches!(self, RelaxationState::Running)
    }
}

/// A running force simulation over one graph
#[derive(Debug, Clone)]
pub struct Relaxation {
    settings: RelaxationSettings,
    center: Point,
    started_at: Instant,
    alpha: f64,
    velocities: Vec<Point>,
    state: RelaxationState,
    ticks: u64,
}

impl Relaxation {
    /// Start a simulation, or `None` when the graph is outside the relaxation band
    pub fn start(
        graph: &TopologyGraph,
        settings: RelaxationSettings,
        center: Point,
        now: Instant,
    ) -> Option<Self> {
        if !settings.applies_to(graph.node_count()) {
            tracing::trace!("Skipping relaxation for {} nodes", graph.node_count());
            return None;
        }

        tracing::debug!("Starting relaxation over {} nodes", graph.node_count());
        Some(Self {
            alpha: settings.initial_alpha,
            settings,
            center,
            started_at: now,
            velocities: vec![Point::default(); graph.node_count()],
            state: RelaxationState::Running,
            ticks: 0,
        })
    }

    pub fn state(&self) -> RelaxationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance one step. Stops once the window has elapsed or alpha has cooled.
    pub fn tick(&mut self, graph: &mut TopologyGraph, now: Instant) -> RelaxationState {
        if !self.is_running() {
            return self.state;
        }
        if self.velocities.len() != graph.node_count() {
            tracing::warn!("Graph changed under a running relaxation, stopping");
            self.stop(graph, StopReason::TargetChanged);
            return self.state;
        }
        if now.saturating_duration_since(self.started_at) >= self.settings.window() {
            self.stop(graph, StopReason::WindowElapsed);
            return self.state;
        }

        self.alpha += (0.0 - self.alpha) * self.settings.alpha_decay;
        self.apply_links(graph);
        self.apply_charge(graph);
        self.apply_center(graph);
        self.apply_collision(graph);
        self.integrate(graph);
        self.ticks += 1;

        if self.alpha < self.settings.alpha_min {
            self.stop(graph, StopReason::Cooled);
        }
        self.state
    }

    /// Stop immediately and freeze every node in place
    pub fn stop(&mut self, graph: &mut TopologyGraph, reason: StopReason) {
        if !self.is_running() {
            return;
        }
        graph.freeze();
        self.state = RelaxationState::Stopped(reason);
        tracing::debug!("Relaxation stopped after {} ticks: {:?}", self.ticks, reason);
    }

    fn apply_links(&mut self, graph: &TopologyGraph) {
        let mut degree = vec![0usize; graph.node_count()];
        for link in &graph.links {
            degree[link.source_index] += 1;
            degree[link.target_index] += 1;
        }

        for link in &graph.links {
            let (s, t) = (link.source_index, link.target_index);
            let (ps, pt) = (graph.nodes[s].position, graph.nodes[t].position);
            let mut dx = pt.x + self.velocities[t].x - ps.x - self.velocities[s].x;
            let mut dy = pt.y + self.velocities[t].y - ps.y - self.velocities[s].y;
            let len = jiggle_len(dx, dy, s + t);
            let k = (len - self.settings.link_distance) / len * self.alpha * self.settings.link_strength;
            dx *= k;
            dy *= k;

            let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;
            self.velocities[t].x -= dx * bias;
            self.velocities[t].y -= dy * bias;
            self.velocities[s].x += dx * (1.0 - bias);
            self.velocities[s].y += dy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self, graph: &TopologyGraph) {
        let n = graph.node_count();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = graph.nodes[j].position.x - graph.nodes[i].position.x;
                let dy = graph.nodes[j].position.y - graph.nodes[i].position.y;
                let dist2 = (dx * dx + dy * dy).max(1.0);
                let w = self.settings.charge_strength * self.alpha / dist2;
                self.velocities[i].x += dx * w;
                self.velocities[i].y += dy * w;
            }
        }
    }

    fn apply_center(&mut self, graph: &TopologyGraph) {
        let k = self.settings.center_strength * self.alpha;
        for (node, v) in graph.nodes.iter().zip(self.velocities.iter_mut()) {
            v.x += (self.center.x - node.position.x) * k;
            v.y += (self.center.y - node.position.y) * k;
        }
    }

    fn apply_collision(&mut self, graph: &TopologyGraph) {
        let min_sep = 2.0 * self.settings.collision_radius;
        let n = graph.node_count();
        for i in 0..n {
            for j in (i + 1)..n {
                let pi = graph.nodes[i].position;
                let pj = graph.nodes[j].position;
                let dx = pj.x + self.velocities[j].x - pi.x - self.velocities[i].x;
                let dy = pj.y + self.velocities[j].y - pi.y - self.velocities[i].y;
                let len = jiggle_len(dx, dy, i * n + j);
                if len >= min_sep {
                    continue;
                }
                let k = (min_sep - len) / len * COLLISION_STRENGTH * 0.5;
                let (dx, dy) = if dx == 0.0 && dy == 0.0 { (len, 0.0) } else { (dx, dy) };
                self.velocities[i].x -= dx * k;
                self.velocities[i].y -= dy * k;
                self.velocities[j].x += dx * k;
                self.velocities[j].y += dy * k;
            }
        }
    }

    fn integrate(&mut self, graph: &mut TopologyGraph) {
        let retain = 1.0 - self.settings.velocity_decay;
        for (node, v) in graph.nodes.iter_mut().zip(self.velocities.iter_mut()) {
            if let Some(pin) = node.pinned {
                node.position = pin;
                *v = Point::default();
                continue;
            }
            v.x *= retain;
            v.y *= retain;
            node.position.x += v.x;
            node.position.y += v.y;
        }
    }
}

/// Vector length, replaced by a tiny deterministic value for coincident points
fn jiggle_len(dx: f64, dy: f64, seed: usize) -> f64 {
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 {
        len
    } else {
        1e-6 * (1 + seed % 7) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{link_id, Direction, EquipmentNode, EquipmentRecord, Field, Link};
    use std::time::Duration;

    fn graph_with(count: usize) -> TopologyGraph {
        let mut nodes = Vec::new();
        for i in 0..count {
            let mut node = EquipmentNode::from_record(
                &EquipmentRecord::new(format!("N{}", i), Field::Ip),
                i as u32,
                Direction::Up,
            );
            node.position = Point::new(400.0 + i as f64 * 10.0, 300.0 + (i % 2) as f64 * 5.0);
            if i == 0 {
                node.is_target = true;
                node.pin_at(Point::new(400.0, 300.0));
            }
            nodes.push(node);
        }
        let links = (1..count)
            .map(|i| Link {
                id: link_id("N0", &format!("N{}", i)),
                source: "N0".to_string(),
                target: format!("N{}", i),
                name: String::new(),
                field: Field::Line,
                direction: Direction::Up,
                source_index: 0,
                target_index: i,
                cable_route: None,
                alarms: Vec::new(),
            })
            .collect();
        TopologyGraph::new("N0", nodes, links)
    }

    #[test]
    fn test_band_limits() {
        let now = Instant::now();
        let center = Point::new(400.0, 300.0);
        assert!(Relaxation::start(&graph_with(2), RelaxationSettings::default(), center, now).is_none());
        assert!(Relaxation::start(&graph_with(3), RelaxationSettings::default(), center, now).is_some());
        assert!(Relaxation::start(&graph_with(20), RelaxationSettings::default(), center, now).is_some());
        assert!(Relaxation::start(&graph_with(21), RelaxationSettings::default(), center, now).is_none());
    }

    #[test]
    fn test_tick_moves_free_nodes_and_keeps_pins() {
        let mut graph = graph_with(4);
        let start = Instant::now();
        let mut relax =
            Relaxation::start(&graph, RelaxationSettings::default(), Point::new(400.0, 300.0), start).unwrap();

        let before: Vec<Point> = graph.nodes.iter().map(|n| n.position).collect();
        for i in 0..10 {
            relax.tick(&mut graph, start + Duration::from_millis(i));
        }

        assert_eq!(graph.nodes[0].position, Point::new(400.0, 300.0));
        assert!(graph.nodes[1..]
            .iter()
            .zip(&before[1..])
            .any(|(n, b)| n.position != *b));
        assert!(graph
            .nodes
            .iter()
            .all(|n| n.position.x.is_finite() && n.position.y.is_finite()));
        assert!(relax.alpha() < 0.1);
    }

    #[test]
    fn test_window_elapsed_freezes_all_nodes() {
        let mut graph = graph_with(5);
        let start = Instant::now();
        let mut relax =
            Relaxation::start(&graph, RelaxationSettings::default(), Point::new(400.0, 300.0), start).unwrap();

        relax.tick(&mut graph, start);
        let state = relax.tick(&mut graph, start + Duration::from_millis(800));

        assert_eq!(state, RelaxationState::Stopped(StopReason::WindowElapsed));
        assert!(graph.nodes.iter().all(|n| n.pinned == Some(n.position)));

        let frozen: Vec<Point> = graph.nodes.iter().map(|n| n.position).collect();
        relax.tick(&mut graph, start + Duration::from_millis(900));
        let after: Vec<Point> = graph.nodes.iter().map(|n| n.position).collect();
        assert_eq!(frozen, after);
    }

    #[test]
    fn test_explicit_stop_reason_is_kept() {
        let mut graph = graph_with(3);
        let start = Instant::now();
        let mut relax =
            Relaxation::start(&graph, RelaxationSettings::default(), Point::new(400.0, 300.0), start).unwrap();

        relax.stop(&mut graph, StopReason::DragStarted);
        relax.stop(&mut graph, StopReason::ViewClosed);
        assert_eq!(relax.state(), RelaxationState::Stopped(StopReason::DragStarted));
        assert_eq!(relax.tick(&mut graph, start), RelaxationState::Stopped(StopReason::DragStarted));
    }

    #[test]
    fn test_cools_without_window() {
        let mut graph = graph_with(3);
        let start = Instant::now();
        let settings = RelaxationSettings {
            window_ms: u64::MAX,
            ..Default::default()
        };
        let mut relax = Relaxation::start(&graph, settings, Point::new(400.0, 300.0), start).unwrap();

        let mut state = RelaxationState::Running;
        for _ in 0..1000 {
            state = relax.tick(&mut graph, start);
            if !state.is_running() {
                break;
            }
        }
        assert_eq!(state, RelaxationState::Stopped(StopReason::Cooled));
    }

    #[test]
    fn test_coincident_nodes_are_separated() {
        let mut graph = graph_with(3);
        graph.nodes[1].position = Point::new(500.0, 300.0);
        graph.nodes[2].position = Point::new(500.0, 300.0);
        let start = Instant::now();
        let mut relax =
            Relaxation::start(&graph, RelaxationSettings::default(), Point::new(400.0, 300.0), start).unwrap();

        relax.tick(&mut graph, start);
        assert_ne!(graph.nodes[1].position, graph.nodes[2].position);
    }
}
