//! Topology neighborhood graph
//!
//! This module builds the snapshot rendered around a faulted device: a bounded
//! breadth-first neighborhood of the target with each node tagged by its level
//! (hop distance) and direction (`up` / `down` relative to the target).
//!
//! # Architecture
//!
//! ```text
//! AlarmDirectory ──resolve──▶ TopologyGraphBuilder ◀──fetch── TopologyClient
//!                                    │
//!                                    ▼
//!                              TopologyGraph  ──▶ LayoutEngine / AnalysisSnapshot
//! ```
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::topology::{AlarmDirectory, TopologyGraphBuilder, NoopTopologyClient};
//!
//! let directory = AlarmDirectory::new(alarms, equipment);
//! let builder = TopologyGraphBuilder::new(Default::default());
//! let graph = builder.build("EQ-100", &directory, &NoopTopologyClient)?;
//! assert_eq!(graph.target().map(|n| n.level), Some(0));
//! ```

pub mod builder;
pub mod client;
pub mod connection;

pub use builder::TopologyGraphBuilder;
pub use client::{NeighborhoodRequest, NeighborhoodResponse, NoopTopologyClient, TopologyClient};
pub use connection::{Connection, WireConnection, CONNECTION_SEPARATOR};

use crate::error::{DashboardError, Result};
use crate::types::{Alarm, EquipmentNode, EquipmentRecord, Field, Link, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ==================== Alarm Directory ====================

/// Read-only view of the current alarm list and the equipment directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlarmDirectory {
    #[serde(default)]
    alarms: Vec<Alarm>,
    #[serde(default)]
    equipment: Vec<EquipmentRecord>,
}

impl AlarmDirectory {
    pub fn new(alarms: Vec<Alarm>, equipment: Vec<EquipmentRecord>) -> Self {
        Self { alarms, equipment }
    }

    /// Load a directory dump (`{"alarms": [...], "equipment": [...]}`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            DashboardError::Serialization(format!("Failed to parse directory {:?}: {}", path, e))
        })
    }

    /// Full alarm list, valid and invalid
    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn equipment(&self) -> &[EquipmentRecord] {
        &self.equipment
    }

    /// All alarms raised by one piece of equipment
    pub fn alarms_for(&self, equip_id: &str) -> Vec<Alarm> {
        self.alarms
            .iter()
            .filter(|a| a.equip_id == equip_id)
            .cloned()
            .collect()
    }

    /// Resolve a target id, consulting the alarm list before the equipment directory
    pub fn resolve(&self, equip_id: &str) -> Option<EquipmentRecord> {
        if let Some(alarm) = self.alarms.iter().find(|a| a.equip_id == equip_id) {
            return Some(EquipmentRecord {
                equip_id: equip_id.to_string(),
                equip_name: alarm.equip_name.clone().unwrap_or_else(|| equip_id.to_string()),
                equip_type: alarm.equip_type.clone().unwrap_or_default(),
                field: alarm.sector.unwrap_or(Field::Other),
                guksa_name: alarm.guksa_name.clone().unwrap_or_default(),
            });
        }

        self.equipment.iter().find(|e| e.equip_id == equip_id).cloned()
    }
}

// ==================== Topology Graph ====================

/// A neighborhood snapshot owned by the caller
#[derive(Debug, Clone, Serialize)]
pub struct TopologyGraph {
    pub target_id: String,
    pub nodes: Vec<EquipmentNode>,
    pub links: Vec<Link>,
    /// The size cap stopped the traversal before the frontier was exhausted
    pub truncated: bool,
    /// Connection records dropped as malformed
    pub skipped_connections: usize,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TopologyGraph {
    pub fn new(target_id: impl Into<String>, nodes: Vec<EquipmentNode>, links: Vec<Link>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self {
            target_id: target_id.into(),
            nodes,
            links,
            truncated: false,
            skipped_connections: 0,
            index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, equip_id: &str) -> Option<usize> {
        self.index.get(equip_id).copied()
    }

    pub fn node(&self, equip_id: &str) -> Option<&EquipmentNode> {
        self.index_of(equip_id).map(|i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, equip_id: &str) -> Option<&mut EquipmentNode> {
        self.index_of(equip_id).map(move |i| &mut self.nodes[i])
    }

    pub fn target(&self) -> Option<&EquipmentNode> {
        self.node(&self.target_id)
    }

    /// Axis-aligned bounding box of all node positions as (min, max)
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let first = self.nodes.first()?.position;
        let (min, max) = self.nodes.iter().fold((first, first), |(min, max), n| {
            (
                Point::new(min.x.min(n.position.x), min.y.min(n.position.y)),
                Point::new(max.x.max(n.position.x), max.y.max(n.position.y)),
            )
        });
        Some((min, max))
    }

    /// Shift every node, pinned coordinates included
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for node in &mut self.nodes {
            node.position.x += dx;
            node.position.y += dy;
            if let Some(pin) = node.pinned.as_mut() {
                pin.x += dx;
                pin.y += dy;
            }
        }
    }

    /// Pin every node at its current position
    pub fn freeze(&mut self) {
        for node in &mut self.nodes {
            node.pinned = Some(node.position);
        }
    }

    /// Ids of nodes carrying at least one alarm
    pub fn alarmed_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|n| n.alarm_count > 0)
            .map(|n| n.id.as_str())
    }
}
