//! Bounded breadth-first neighborhood builder

use super::client::{NeighborhoodRequest, NeighborhoodResponse, TopologyClient};
use super::connection::Connection;
use super::{AlarmDirectory, TopologyGraph};
use crate::config::TopologySettings;
use crate::error::{DashboardError, Result, ResultExt};
use crate::types::{link_id, CableRoute, Direction, EquipmentNode, EquipmentRecord, Field, Link};
use std::collections::{HashMap, HashSet, VecDeque};

/// Builds [`TopologyGraph`] snapshots around a target
#[derive(Debug, Clone, Default)]
pub struct TopologyGraphBuilder {
    settings: TopologySettings,
}

impl TopologyGraphBuilder {
    pub fn new(settings: TopologySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TopologySettings {
        &self.settings
    }

    /// Resolve the target, fetch its neighborhood and assemble the snapshot.
    ///
    /// Returns [`DashboardError::NotFound`] when the target is in neither the
    /// alarm list nor the equipment directory.
    pub fn build(
        &self,
        target_id: &str,
        directory: &AlarmDirectory,
        client: &dyn TopologyClient,
    ) -> Result<TopologyGraph> {
        let target = directory
            .resolve(target_id)
            .ok_or_else(|| DashboardError::NotFound(target_id.to_string()))?;

        let request = NeighborhoodRequest::for_target(&target);
        let response = client
            .fetch_neighborhood(&request)
            .with_context(|| format!("Failed to fetch neighborhood of {}", target_id))?;

        Ok(self.assemble(&target, response, directory))
    }

    /// Assemble a snapshot from an already fetched neighborhood
    pub fn assemble(
        &self,
        target: &EquipmentRecord,
        response: NeighborhoodResponse,
        directory: &AlarmDirectory,
    ) -> TopologyGraph {
        let mut skipped = 0;
        let connections: Vec<Connection> = response
            .links
            .into_iter()
            .filter_map(|wire| match wire.into_connection() {
                Ok(conn) => Some(conn),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping connection record: {}", e);
                    None
                }
            })
            .collect();

        let equipment: HashMap<String, EquipmentRecord> = response
            .equipment
            .into_iter()
            .map(|(key, mut record)| {
                if record.equip_id.is_empty() {
                    record.equip_id = key.clone();
                }
                (key, record)
            })
            .collect();

        let (nodes, truncated) = self.traverse(target, &connections, &equipment, directory);
        let links = build_links(&nodes, &connections);

        tracing::info!(
            "Built topology for {}: {} nodes, {} links{}",
            target.equip_id,
            nodes.len(),
            links.len(),
            if truncated { " (truncated)" } else { "" }
        );

        let mut graph = TopologyGraph::new(target.equip_id.clone(), nodes, links);
        graph.truncated = truncated;
        graph.skipped_connections = skipped;
        graph
    }

    fn traverse(
        &self,
        target: &EquipmentRecord,
        connections: &[Connection],
        equipment: &HashMap<String, EquipmentRecord>,
        directory: &AlarmDirectory,
    ) -> (Vec<EquipmentNode>, bool) {
        let mut adjacency: HashMap<&str, Vec<&Connection>> = HashMap::new();
        for conn in connections {
            adjacency.entry(conn.source.as_str()).or_default().push(conn);
            if conn.target != conn.source {
                adjacency.entry(conn.target.as_str()).or_default().push(conn);
            }
        }

        let cap = self.settings.max_neighborhood.max(1);
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, u32, Direction)> = VecDeque::new();
        let mut nodes = Vec::new();
        let mut truncated = false;

        visited.insert(target.equip_id.as_str());
        queue.push_back((target.equip_id.as_str(), 0, Direction::Center));

        while let Some((id, level, direction)) = queue.pop_front() {
            let is_target = level == 0;
            let record = equipment.get(id).or(is_target.then_some(target));

            match record {
                Some(record) => {
                    let mut node = EquipmentNode::from_record(record, level, direction);
                    node.id = id.to_string();
                    node.is_target = is_target;
                    node.set_alarms(directory.alarms_for(id));
                    nodes.push(node);
                }
                None => tracing::debug!("Equipment {} missing from directory, not placed", id),
            }

            for conn in adjacency.get(id).into_iter().flatten() {
                let Some((neighbor, neighbor_direction)) = conn.neighbor_of(id) else {
                    continue;
                };
                if visited.contains(neighbor) {
                    continue;
                }
                if visited.len() >= cap {
                    truncated = true;
                    continue;
                }
                visited.insert(neighbor);
                queue.push_back((neighbor, level + 1, neighbor_direction));
            }
        }

        (nodes, truncated)
    }
}

/// One link per unordered endpoint pair, both endpoints in the node set
fn build_links(nodes: &[EquipmentNode], connections: &[Connection]) -> Vec<Link> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for conn in connections {
        if conn.source == conn.target {
            continue;
        }
        let (Some(&si), Some(&ti)) = (index.get(conn.source.as_str()), index.get(conn.target.as_str()))
        else {
            continue;
        };

        let id = link_id(&conn.source, &conn.target);
        if !seen.insert(id.clone()) {
            continue;
        }

        let (source, target) = (&nodes[si], &nodes[ti]);
        let field = if source.field == Field::Mw && target.field == Field::Mw {
            Field::Mw
        } else {
            Field::Line
        };

        links.push(Link {
            id,
            source: conn.source.clone(),
            target: conn.target.clone(),
            name: conn.link_name.clone(),
            field,
            direction: conn.direction,
            source_index: si,
            target_index: ti,
            cable_route: (field == Field::Line)
                .then(|| CableRoute::between(&source.site, &target.site)),
            alarms: source.alarms.iter().chain(&target.alarms).cloned().collect(),
        });
    }

    links
}
