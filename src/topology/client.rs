//! Neighborhood fetch collaborator

use super::connection::WireConnection;
use crate::error::Result;
use crate::types::EquipmentRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request for the equipment neighborhood of a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodRequest {
    pub equip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guksa_name: Option<String>,
}

impl NeighborhoodRequest {
    pub fn for_target(target: &EquipmentRecord) -> Self {
        Self {
            equip_id: target.equip_id.clone(),
            guksa_name: (!target.guksa_name.is_empty()).then(|| target.guksa_name.clone()),
        }
    }
}

/// Equipment directory and connection records around a target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodResponse {
    #[serde(default, alias = "equipment_map")]
    pub equipment: HashMap<String, EquipmentRecord>,

    #[serde(default)]
    pub links: Vec<WireConnection>,
}

impl NeighborhoodResponse {
    /// Insert a directory record keyed by its id
    pub fn with_equipment(mut self, record: EquipmentRecord) -> Self {
        self.equipment.insert(record.equip_id.clone(), record);
        self
    }

    pub fn with_link(mut self, link: impl Into<WireConnection>) -> Self {
        self.links.push(link.into());
        self
    }
}

/// Source of neighborhood data for the graph builder
#[cfg_attr(test, mockall::automock)]
pub trait TopologyClient: Send + Sync {
    /// Fetch the equipment directory and connection records around a target
    fn fetch_neighborhood(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResponse>;
}

/// Client that knows no neighbors; graphs contain only the target
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTopologyClient;

impl TopologyClient for NoopTopologyClient {
    fn fetch_neighborhood(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResponse> {
        tracing::trace!("No topology client configured, empty neighborhood for {}", request.equip_id);
        Ok(NeighborhoodResponse::default())
    }
}
