//! Multi-stage fault correlation
//!
//! Given a topology snapshot and the full alarm list, the
//! [`FaultCorrelationEngine`] classifies each node and link into at most one
//! failure category. Stages run in a fixed priority order and an element
//! claimed by an earlier stage is never reconsidered:
//!
//! 1. Line failure (alarmed endpoints on a cable link)
//! 2. MW fading / power failure (telemetry-backed)
//! 3. Upstream propagation (every deeper node alarmed, no shallower node alarmed)
//! 4. Exchange failure (`A1395` / `A1930` rules)
//! 5. Transmission failure (`LOS` / `LOF`)
//!
//! The engine reads an [`AnalysisSnapshot`], which is also the payload
//! submitted to a remote analysis service, and returns an independent
//! [`CorrelationReport`].

pub mod engine;
pub mod signal;
pub mod telemetry;

pub use engine::FaultCorrelationEngine;
pub use signal::{SampledTelemetry, SignalSource};
pub use telemetry::{FadingStatus, NoopTelemetry, PowerStatus, TelemetryClient};

use crate::topology::TopologyGraph;
use crate::types::{Alarm, ElementKind, EquipmentNode, FailureCategory, FailurePoint, Link};
use serde::{Deserialize, Serialize};

/// Read-only input of a correlation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    #[serde(default)]
    pub nodes: Vec<EquipmentNode>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Full alarm list, valid and invalid
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

impl AnalysisSnapshot {
    pub fn new(nodes: Vec<EquipmentNode>, links: Vec<Link>, alarms: Vec<Alarm>) -> Self {
        Self { nodes, links, alarms }
    }

    /// Copy the nodes and links out of a graph
    pub fn from_graph(graph: &TopologyGraph, alarms: &[Alarm]) -> Self {
        Self::new(graph.nodes.clone(), graph.links.clone(), alarms.to_vec())
    }
}

/// Per-category counts, always derived from the failure point list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSummary {
    pub total_failure_points: usize,
    pub node_failures: usize,
    pub link_failures: usize,
    pub line_failures: usize,
    pub mw_equipment_failures: usize,
    pub mw_fading_failures: usize,
    pub mw_voltage_failures: usize,
    pub upper_node_failures: usize,
    pub exchange_failures: usize,
    pub transmission_failures: usize,
}

impl CorrelationSummary {
    pub fn from_points(points: &[FailurePoint]) -> Self {
        let in_category = |c: FailureCategory| count(points, |p| p.category == c);

        Self {
            total_failure_points: points.len(),
            node_failures: count(points, |p| p.kind == ElementKind::Node),
            link_failures: count(points, |p| p.kind == ElementKind::Link),
            line_failures: in_category(FailureCategory::LineFailure),
            mw_equipment_failures: in_category(FailureCategory::MwFailure),
            mw_fading_failures: count(points, |p| p.fading == Some(true)),
            mw_voltage_failures: count(points, |p| p.low_voltage == Some(true)),
            upper_node_failures: in_category(FailureCategory::UpstreamNode),
            exchange_failures: in_category(FailureCategory::ExchangeFailure),
            transmission_failures: in_category(FailureCategory::TransmissionFailure),
        }
    }
}

fn count(points: &[FailurePoint], predicate: impl Fn(&FailurePoint) -> bool) -> usize {
    points.iter().filter(|&p| predicate(p)).count()
}

/// Output of a correlation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationReport {
    pub failure_points: Vec<FailurePoint>,
    pub summary: CorrelationSummary,
    #[serde(alias = "total_analyzed_nodes")]
    pub analyzed_nodes: usize,
    #[serde(alias = "total_analyzed_links")]
    pub analyzed_links: usize,
    #[serde(alias = "total_analyzed_alarms")]
    pub analyzed_alarms: usize,
    /// Telemetry checks that failed and were treated as "no signal"
    pub telemetry_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CorrelationReport {
    pub fn is_empty(&self) -> bool {
        self.failure_points.is_empty()
    }

    /// Recount the summary from the failure point list
    ///
    /// Reports decoded from the analysis service carry a partial summary.
    pub fn with_derived_summary(mut self) -> Self {
        self.summary = CorrelationSummary::from_points(&self.failure_points);
        self
    }

    /// Ids of every classified element, in classification order
    pub fn implicated_ids(&self) -> impl Iterator<Item = &str> {
        self.failure_points.iter().map(|p| p.target_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;

    fn point(kind: ElementKind, category: FailureCategory) -> FailurePoint {
        FailurePoint {
            target_id: "X".to_string(),
            kind,
            name: "X".to_string(),
            field: Field::Mw,
            category,
            failure_type: String::new(),
            inference_detail: String::new(),
            fading: None,
            low_voltage: None,
            alarm_count: 1,
            confidence: 0.5,
        }
    }

    #[test]
    fn test_summary_recount() {
        let mut fading_link = point(ElementKind::Link, FailureCategory::MwFailure);
        fading_link.fading = Some(true);
        let mut battery_node = point(ElementKind::Node, FailureCategory::MwFailure);
        battery_node.low_voltage = Some(true);
        battery_node.fading = Some(false);

        let points = vec![
            point(ElementKind::Link, FailureCategory::LineFailure),
            fading_link,
            battery_node,
            point(ElementKind::Node, FailureCategory::UpstreamNode),
            point(ElementKind::Node, FailureCategory::TransmissionFailure),
        ];
        let summary = CorrelationSummary::from_points(&points);

        assert_eq!(summary.total_failure_points, 5);
        assert_eq!(summary.node_failures, 3);
        assert_eq!(summary.link_failures, 2);
        assert_eq!(summary.line_failures, 1);
        assert_eq!(summary.mw_equipment_failures, 2);
        assert_eq!(summary.mw_fading_failures, 1);
        assert_eq!(summary.mw_voltage_failures, 1);
        assert_eq!(summary.upper_node_failures, 1);
        assert_eq!(summary.exchange_failures, 0);
        assert_eq!(summary.transmission_failures, 1);
    }

    #[test]
    fn test_report_decodes_partial_payload() {
        let report: CorrelationReport =
            serde_json::from_str(r#"{"failure_points": [], "message": "no alarms"}"#).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.summary, CorrelationSummary::default());
        assert_eq!(report.message.as_deref(), Some("no alarms"));
    }
}
