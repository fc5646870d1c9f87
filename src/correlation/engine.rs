//! Fixed-priority rule pipeline

use super::telemetry::{FadingStatus, NoopTelemetry, PowerStatus, TelemetryClient};
use super::{AnalysisSnapshot, CorrelationReport, CorrelationSummary};
use crate::config::CorrelationSettings;
use crate::error::{DashboardError, Result};
use crate::types::{Alarm, ElementKind, EquipmentNode, FailureCategory, FailurePoint, Field, Link};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Fields eligible for the upstream-propagation rule
const UPSTREAM_FIELDS: [Field; 5] = [
    Field::Ip,
    Field::Transmission,
    Field::Exchange,
    Field::Mw,
    Field::Wireless,
];

const MW_POWER_CONFIDENCE: f32 = 0.85;
const SPECIFIC_RULE_CONFIDENCE: f32 = 0.8;
/// Exchanges above a node reporting an A1930 storm
const A1930_UPSTREAM_CONFIDENCE: f32 = 0.7;
const GENERIC_RULE_CONFIDENCE: f32 = 0.6;

// ==================== Alarm Index ====================

/// Active alarms grouped by equipment id
struct AlarmIndex<'a> {
    by_equipment: HashMap<&'a str, Vec<&'a Alarm>>,
    fields: HashMap<&'a str, Field>,
}

impl<'a> AlarmIndex<'a> {
    fn build(snapshot: &'a AnalysisSnapshot, valid_only: bool) -> Self {
        let active = |a: &&Alarm| !valid_only || a.valid;
        let mut by_equipment: HashMap<&str, Vec<&Alarm>> = HashMap::new();

        for alarm in snapshot.alarms.iter().filter(active) {
            by_equipment.entry(alarm.equip_id.as_str()).or_default().push(alarm);
        }
        // Embedded alarms only fill in for equipment the full list does not mention
        for node in &snapshot.nodes {
            if by_equipment.contains_key(node.id.as_str()) {
                continue;
            }
            let embedded: Vec<&Alarm> = node.alarms.iter().filter(active).collect();
            if !embedded.is_empty() {
                by_equipment.insert(node.id.as_str(), embedded);
            }
        }

        let fields = snapshot
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.field))
            .collect();

        Self { by_equipment, fields }
    }

    fn is_empty(&self) -> bool {
        self.by_equipment.is_empty()
    }

    fn total(&self) -> usize {
        self.by_equipment.values().map(Vec::len).sum()
    }

    fn alarms_for(&self, equip_id: &str) -> &[&'a Alarm] {
        self.by_equipment
            .get(equip_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn is_alarmed(&self, equip_id: &str) -> bool {
        !self.alarms_for(equip_id).is_empty()
    }

    fn link_alarm_count(&self, link: &Link) -> usize {
        self.alarms_for(&link.source).len() + self.alarms_for(&link.target).len()
    }

    fn count_mentions(&self, equip_id: &str, code: &str) -> usize {
        self.alarms_for(equip_id)
            .iter()
            .filter(|a| a.mentions(code))
            .count()
    }

    /// Whether any active alarm comes from equipment in one of `fields`
    fn any_from_fields(&self, fields: &[Field]) -> bool {
        self.by_equipment.iter().any(|(id, alarms)| {
            let node_field = self.fields.get(id).copied();
            alarms.iter().any(|a| {
                a.sector
                    .or(node_field)
                    .is_some_and(|field| fields.contains(&field))
            })
        })
    }
}

// ==================== Run State ====================

struct Run<'a> {
    snapshot: &'a AnalysisSnapshot,
    alarms: AlarmIndex<'a>,
    claimed: HashSet<(ElementKind, String)>,
    points: Vec<FailurePoint>,
    telemetry_failures: usize,
}

impl<'a> Run<'a> {
    fn is_claimed(&self, kind: ElementKind, id: &str) -> bool {
        self.claimed.contains(&(kind, id.to_string()))
    }

    fn claim(&mut self, point: FailurePoint) {
        if self.claimed.insert((point.kind, point.target_id.clone())) {
            tracing::debug!(
                "Stage {} classified {} as {}",
                point.category.stage(),
                point.target_id,
                point.failure_type
            );
            self.points.push(point);
        }
    }

    fn telemetry_failed(&mut self, element: &str, err: DashboardError) {
        self.telemetry_failures += 1;
        let err = DashboardError::PartialTelemetry {
            element: element.to_string(),
            message: err.to_string(),
        };
        tracing::warn!("{}, treating as no signal", err);
    }

    /// Unclaimed nodes of `field` carrying an active alarm
    fn alarmed_nodes(&self, field: Field) -> Vec<&'a EquipmentNode> {
        self.snapshot
            .nodes
            .iter()
            .filter(|n| n.field == field)
            .filter(|n| self.alarms.is_alarmed(&n.id))
            .filter(|n| !self.is_claimed(ElementKind::Node, &n.id))
            .collect()
    }
}

fn node_point(
    node: &EquipmentNode,
    category: FailureCategory,
    failure_type: &str,
    detail: String,
    alarm_count: usize,
    confidence: f32,
) -> FailurePoint {
    FailurePoint {
        target_id: node.id.clone(),
        kind: ElementKind::Node,
        name: node.name.clone(),
        field: node.field,
        category,
        failure_type: failure_type.to_string(),
        inference_detail: detail,
        fading: None,
        low_voltage: None,
        alarm_count,
        confidence,
    }
}

fn link_point(
    link: &Link,
    category: FailureCategory,
    failure_type: &str,
    detail: String,
    alarm_count: usize,
    confidence: f32,
) -> FailurePoint {
    let name = if link.name.is_empty() {
        format!("{} - {}", link.source, link.target)
    } else {
        link.name.clone()
    };
    FailurePoint {
        target_id: link.id.clone(),
        kind: ElementKind::Link,
        name,
        field: link.field,
        category,
        failure_type: failure_type.to_string(),
        inference_detail: detail,
        fading: None,
        low_voltage: None,
        alarm_count,
        confidence,
    }
}

// ==================== Engine ====================

/// Classifies snapshot elements into failure categories
pub struct FaultCorrelationEngine {
    settings: CorrelationSettings,
    telemetry: Arc<dyn TelemetryClient>,
}

impl FaultCorrelationEngine {
    pub fn new(settings: CorrelationSettings, telemetry: Arc<dyn TelemetryClient>) -> Self {
        Self { settings, telemetry }
    }

    /// Engine whose MW checks never report a fault
    pub fn without_telemetry(settings: CorrelationSettings) -> Self {
        Self::new(settings, Arc::new(NoopTelemetry))
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    pub fn analyze(&self, snapshot: &AnalysisSnapshot) -> CorrelationReport {
        self.analyze_with_progress(snapshot, &mut |_| {})
    }

    /// Run every stage, reporting a short message before each one
    pub fn analyze_with_progress(
        &self,
        snapshot: &AnalysisSnapshot,
        progress: &mut dyn FnMut(&str),
    ) -> CorrelationReport {
        let mut report = CorrelationReport {
            analyzed_nodes: snapshot.nodes.len(),
            analyzed_links: snapshot.links.len(),
            analyzed_alarms: snapshot.alarms.len(),
            ..Default::default()
        };

        let alarms = AlarmIndex::build(snapshot, self.settings.valid_alarms_only);
        if snapshot.nodes.is_empty() || alarms.is_empty() {
            let message = if snapshot.nodes.is_empty() {
                "No equipment in the snapshot"
            } else {
                "No active alarms in the snapshot"
            };
            tracing::info!("Skipping correlation: {}", message);
            report.message = Some(message.to_string());
            return report;
        }

        tracing::info!(
            "Correlating {} nodes, {} links, {} active alarms",
            snapshot.nodes.len(),
            snapshot.links.len(),
            alarms.total()
        );

        let mut run = Run {
            snapshot,
            alarms,
            claimed: HashSet::new(),
            points: Vec::new(),
            telemetry_failures: 0,
        };

        progress("Checking line failures");
        self.line_stage(&mut run);
        progress("Checking MW fading and power");
        self.mw_stage(&mut run);
        progress("Checking upstream nodes");
        self.upstream_stage(&mut run);
        progress("Checking exchange alarms");
        self.exchange_stage(&mut run);
        progress("Checking transmission alarms");
        self.transmission_stage(&mut run);

        let message = format!("{} failure points identified", run.points.len());
        progress(&message);
        tracing::info!("{}", message);

        report.summary = CorrelationSummary::from_points(&run.points);
        report.failure_points = run.points;
        report.telemetry_failures = run.telemetry_failures;
        report.message = Some(message);
        report
    }

    fn line_stage(&self, run: &mut Run<'_>) {
        let snapshot = run.snapshot;
        for link in &snapshot.links {
            if link.field != Field::Line || run.is_claimed(ElementKind::Link, &link.id) {
                continue;
            }
            let alarm_count = run.alarms.link_alarm_count(link);
            if alarm_count == 0 {
                continue;
            }
            run.claim(link_point(
                link,
                FailureCategory::LineFailure,
                "Line failure",
                format!(
                    "Alarms on both sides of the cable between {} and {}; cable damage suspected",
                    link.source, link.target
                ),
                alarm_count,
                self.settings.link_confidence,
            ));
        }
    }

    fn mw_stage(&self, run: &mut Run<'_>) {
        let snapshot = run.snapshot;
        let mw_links: Vec<&Link> = snapshot
            .links
            .iter()
            .filter(|l| l.field == Field::Mw)
            .filter(|l| !run.is_claimed(ElementKind::Link, &l.id))
            .filter(|l| run.alarms.link_alarm_count(l) > 0)
            .collect();

        let fading = self.run_checks(&mw_links, |link| {
            self.telemetry.check_fading(&link.source, &link.target)
        });

        let mut fading_nodes: HashSet<&str> = HashSet::new();
        for (link, result) in mw_links.iter().zip(fading) {
            match result {
                Ok(FadingStatus::Fading) => {
                    fading_nodes.insert(&link.source);
                    fading_nodes.insert(&link.target);
                    let mut point = link_point(
                        link,
                        FailureCategory::MwFailure,
                        "MW fading",
                        format!(
                            "Radio hop {} - {} is fading; check weather and antenna alignment",
                            link.source, link.target
                        ),
                        run.alarms.link_alarm_count(link),
                        self.settings.link_confidence,
                    );
                    point.fading = Some(true);
                    run.claim(point);
                }
                Ok(FadingStatus::Normal) => {}
                Err(e) => run.telemetry_failed(&link.id, e),
            }
        }

        let mw_nodes = run.alarmed_nodes(Field::Mw);
        let power = self.run_checks(&mw_nodes, |node| {
            self.telemetry.check_power(&node.id, &node.site)
        });

        for (node, result) in mw_nodes.iter().zip(power) {
            match result {
                Ok(PowerStatus::Battery) => {
                    let fading = fading_nodes.contains(node.id.as_str());
                    let (failure_type, detail) = if fading {
                        (
                            "MW fading + power failure",
                            format!("{} is on battery and its radio hop is fading", node.id),
                        )
                    } else {
                        (
                            "MW power failure",
                            format!("{} is running on battery; check the site power supply", node.id),
                        )
                    };
                    let mut point = node_point(
                        node,
                        FailureCategory::MwFailure,
                        failure_type,
                        detail,
                        run.alarms.alarms_for(&node.id).len(),
                        MW_POWER_CONFIDENCE,
                    );
                    point.fading = Some(fading);
                    point.low_voltage = Some(true);
                    run.claim(point);
                }
                Ok(PowerStatus::Mains) => {}
                Err(e) => run.telemetry_failed(&node.id, e),
            }
        }
    }

    fn upstream_stage(&self, run: &mut Run<'_>) {
        let snapshot = run.snapshot;
        let nodes = &snapshot.nodes;
        let alarmed: Vec<bool> = nodes.iter().map(|n| run.alarms.is_alarmed(&n.id)).collect();

        for (node, &is_alarmed) in nodes.iter().zip(&alarmed) {
            if !is_alarmed
                || !UPSTREAM_FIELDS.contains(&node.field)
                || run.is_claimed(ElementKind::Node, &node.id)
            {
                continue;
            }

            let mut deeper = 0;
            let mut deeper_alarmed = 0;
            let mut shallower_alarmed = false;
            for (other, &other_alarmed) in nodes.iter().zip(&alarmed) {
                if other.level > node.level {
                    deeper += 1;
                    deeper_alarmed += usize::from(other_alarmed);
                } else if other.level < node.level && other_alarmed {
                    shallower_alarmed = true;
                }
            }

            if deeper > 0 && deeper == deeper_alarmed && !shallower_alarmed {
                run.claim(node_point(
                    node,
                    FailureCategory::UpstreamNode,
                    "Upstream node failure",
                    format!(
                        "All {} downstream nodes are alarmed and nothing upstream is; probable origin at level {}",
                        deeper, node.level
                    ),
                    run.alarms.alarms_for(&node.id).len(),
                    self.settings.upstream_confidence,
                ));
            }
        }
    }

    fn exchange_stage(&self, run: &mut Run<'_>) {
        let candidates = run.alarmed_nodes(Field::Exchange);
        let other_field_alarms = run.alarms.any_from_fields(&[Field::Ip, Field::Transmission]);

        for node in &candidates {
            if run.is_claimed(ElementKind::Node, &node.id) {
                continue;
            }
            let alarm_count = run.alarms.alarms_for(&node.id).len();
            let a1395 = run.alarms.count_mentions(&node.id, "A1395");
            let a1930 = run.alarms.count_mentions(&node.id, "A1930");

            if a1395 >= self.settings.a1395_mass_threshold {
                run.claim(node_point(
                    node,
                    FailureCategory::ExchangeFailure,
                    "Exchange A1395 failure",
                    format!("{} A1395 alarms; check the CGW and CGW-linked equipment", a1395),
                    alarm_count,
                    SPECIFIC_RULE_CONFIDENCE,
                ));
            } else if a1930 > 0 && a1930 <= self.settings.a1930_standalone_max && !other_field_alarms {
                run.claim(node_point(
                    node,
                    FailureCategory::ExchangeFailure,
                    "Exchange A1930 standalone failure",
                    format!("{} A1930 alarms with no IP or transmission alarms; check the AGW common unit", a1930),
                    alarm_count,
                    SPECIFIC_RULE_CONFIDENCE,
                ));
            } else if a1930 > self.settings.a1930_standalone_max && other_field_alarms {
                for upper in candidates.iter().filter(|u| u.level < node.level) {
                    if run.is_claimed(ElementKind::Node, &upper.id) {
                        continue;
                    }
                    run.claim(node_point(
                        upper,
                        FailureCategory::ExchangeFailure,
                        "Exchange A1930 upstream failure",
                        format!("Upstream of {} reporting {} A1930 alarms", node.id, a1930),
                        run.alarms.alarms_for(&upper.id).len(),
                        A1930_UPSTREAM_CONFIDENCE,
                    ));
                }
            }
        }

        for node in candidates {
            if run.is_claimed(ElementKind::Node, &node.id) {
                continue;
            }
            let alarm_count = run.alarms.alarms_for(&node.id).len();
            run.claim(node_point(
                node,
                FailureCategory::ExchangeFailure,
                "Exchange failure",
                format!("{} active exchange alarms", alarm_count),
                alarm_count,
                GENERIC_RULE_CONFIDENCE,
            ));
        }
    }

    fn transmission_stage(&self, run: &mut Run<'_>) {
        for node in run.alarmed_nodes(Field::Transmission) {
            let alarm_count = run.alarms.alarms_for(&node.id).len();
            let point = if run.alarms.count_mentions(&node.id, "LOS") > 0 {
                node_point(
                    node,
                    FailureCategory::TransmissionFailure,
                    "Transmission LOS failure",
                    "Loss of signal; opposite-station equipment fault or optical line cut".to_string(),
                    alarm_count,
                    0.9,
                )
            } else if run.alarms.count_mentions(&node.id, "LOF") > 0 {
                node_point(
                    node,
                    FailureCategory::TransmissionFailure,
                    "Transmission LOF failure",
                    "Loss of frame; opposite-station equipment defect".to_string(),
                    alarm_count,
                    SPECIFIC_RULE_CONFIDENCE,
                )
            } else {
                node_point(
                    node,
                    FailureCategory::TransmissionFailure,
                    "Transmission failure",
                    format!("{} active transmission alarms", alarm_count),
                    alarm_count,
                    GENERIC_RULE_CONFIDENCE,
                )
            };
            run.claim(point);
        }
    }

    /// Run telemetry checks, at most `telemetry_concurrency` at a time,
    /// returning results in input order
    fn run_checks<T, R>(&self, items: &[T], check: impl Fn(&T) -> Result<R> + Sync) -> Vec<Result<R>>
    where
        T: Sync,
        R: Send,
    {
        let workers = self.settings.telemetry_concurrency.max(1);
        if workers == 1 || items.len() <= 1 {
            return items.iter().map(&check).collect();
        }

        let chunk_size = items.len().div_ceil(workers);
        let check = &check;
        std::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_size)
                .map(|chunk| {
                    (
                        chunk.len(),
                        scope.spawn(move || chunk.iter().map(check).collect::<Vec<_>>()),
                    )
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(len, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        (0..len)
                            .map(|_| Err(DashboardError::Channel("telemetry worker panicked".to_string())))
                            .collect()
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::telemetry::MockTelemetryClient;
    use crate::types::{link_id, Direction, EquipmentRecord};
    use proptest::prelude::*;

    fn node(id: &str, field: Field, level: u32) -> EquipmentNode {
        let mut node = EquipmentNode::from_record(
            &EquipmentRecord::new(id, field).with_site(format!("site-{}", id)),
            level,
            if level == 0 { Direction::Center } else { Direction::Up },
        );
        node.is_target = level == 0;
        node
    }

    fn link(nodes: &[EquipmentNode], a: usize, b: usize, name: &str) -> Link {
        let field = if nodes[a].field == Field::Mw && nodes[b].field == Field::Mw {
            Field::Mw
        } else {
            Field::Line
        };
        Link {
            id: link_id(&nodes[a].id, &nodes[b].id),
            source: nodes[a].id.clone(),
            target: nodes[b].id.clone(),
            name: name.to_string(),
            field,
            direction: Direction::Up,
            source_index: a,
            target_index: b,
            cable_route: None,
            alarms: Vec::new(),
        }
    }

    fn engine(telemetry: impl TelemetryClient + 'static) -> FaultCorrelationEngine {
        FaultCorrelationEngine::new(CorrelationSettings::default(), Arc::new(telemetry))
    }

    fn mw_scenario() -> AnalysisSnapshot {
        let nodes = vec![
            node("EQ-200", Field::Mw, 0),
            node("EQ-100", Field::Mw, 1),
            node("EQ-300", Field::Line, 1),
        ];
        let links = vec![link(&nodes, 1, 0, "L1"), link(&nodes, 0, 2, "L2")];
        let alarms = vec![Alarm::new("EQ-200", "RSL low"), Alarm::new("EQ-300", "cable alarm")];
        AnalysisSnapshot::new(nodes, links, alarms)
    }

    #[test]
    fn test_mw_scenario() {
        let mut telemetry = MockTelemetryClient::new();
        telemetry
            .expect_check_fading()
            .withf(|s, t| s == "EQ-100" && t == "EQ-200")
            .times(1)
            .returning(|_, _| Ok(FadingStatus::Fading));
        telemetry
            .expect_check_power()
            .withf(|id, site| id == "EQ-200" && site == "site-EQ-200")
            .times(1)
            .returning(|_, _| Ok(PowerStatus::Mains));

        let report = engine(telemetry).analyze(&mw_scenario());

        assert_eq!(report.failure_points.len(), 2);
        let line = &report.failure_points[0];
        assert_eq!(line.name, "L2");
        assert_eq!(line.category, FailureCategory::LineFailure);
        let fading = &report.failure_points[1];
        assert_eq!(fading.name, "L1");
        assert_eq!(fading.category, FailureCategory::MwFailure);
        assert_eq!(fading.fading, Some(true));

        assert_eq!(report.summary.line_failures, 1);
        assert_eq!(report.summary.mw_fading_failures, 1);
        assert_eq!(report.summary.mw_voltage_failures, 0);
        assert_eq!(report.summary.link_failures, 2);
    }

    #[test]
    fn test_zero_alarms_yields_empty_report() {
        let mut telemetry = MockTelemetryClient::new();
        telemetry.expect_check_fading().never();
        telemetry.expect_check_power().never();

        let mut snapshot = mw_scenario();
        snapshot.alarms.clear();
        let report = engine(telemetry).analyze(&snapshot);

        assert!(report.is_empty());
        assert_eq!(report.summary, CorrelationSummary::default());
        assert!(report.message.is_some());
    }

    #[test]
    fn test_telemetry_failure_is_absorbed() {
        let mut telemetry = MockTelemetryClient::new();
        telemetry
            .expect_check_fading()
            .returning(|_, _| Err(DashboardError::Network("timeout".to_string())));
        telemetry
            .expect_check_power()
            .returning(|_, _| Err(DashboardError::Network("timeout".to_string())));

        let report = engine(telemetry).analyze(&mw_scenario());

        assert_eq!(report.telemetry_failures, 2);
        assert_eq!(report.failure_points.len(), 1);
        assert_eq!(report.failure_points[0].category, FailureCategory::LineFailure);
    }

    #[test]
    fn test_battery_node_carries_both_flags() {
        let mut telemetry = MockTelemetryClient::new();
        telemetry
            .expect_check_fading()
            .returning(|_, _| Ok(FadingStatus::Fading));
        telemetry
            .expect_check_power()
            .returning(|_, _| Ok(PowerStatus::Battery));

        let report = engine(telemetry).analyze(&mw_scenario());
        let power = report
            .failure_points
            .iter()
            .find(|p| p.kind == ElementKind::Node)
            .unwrap();

        assert_eq!(power.target_id, "EQ-200");
        assert_eq!(power.low_voltage, Some(true));
        assert_eq!(power.fading, Some(true));
        assert_eq!(power.failure_type, "MW fading + power failure");
        assert_eq!(report.summary.mw_voltage_failures, 1);
        assert_eq!(report.summary.mw_fading_failures, 2);
    }

    #[test]
    fn test_upstream_rule() {
        let nodes = vec![
            node("T", Field::Ip, 0),
            node("A", Field::Ip, 1),
            node("B", Field::Wireless, 2),
        ];
        let alarms = vec![Alarm::new("T", "x"), Alarm::new("A", "y"), Alarm::new("B", "z")];
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        assert_eq!(report.failure_points.len(), 1);
        assert_eq!(report.failure_points[0].target_id, "T");
        assert_eq!(report.failure_points[0].category, FailureCategory::UpstreamNode);
        assert_eq!(report.failure_points[0].confidence, 0.8);
    }

    #[test]
    fn test_upstream_rule_requires_all_deeper_alarmed() {
        let nodes = vec![
            node("T", Field::Ip, 0),
            node("A", Field::Ip, 1),
            node("B", Field::Ip, 1),
        ];
        let alarms = vec![Alarm::new("T", "x"), Alarm::new("A", "y")];
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        assert!(report.is_empty());
    }

    #[test]
    fn test_exchange_a1395_mass_failure() {
        let nodes = vec![node("X", Field::Exchange, 0), node("Y", Field::Ip, 1)];
        let alarms: Vec<Alarm> = (0..100).map(|i| Alarm::new("X", format!("A1395 trunk {}", i))).collect();
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        assert_eq!(report.failure_points.len(), 1);
        assert_eq!(report.failure_points[0].failure_type, "Exchange A1395 failure");
        assert_eq!(report.summary.exchange_failures, 1);
    }

    #[test]
    fn test_exchange_a1930_standalone() {
        let nodes = vec![
            node("T", Field::Ip, 0),
            node("X", Field::Exchange, 1),
            node("Y", Field::Exchange, 1),
        ];
        let alarms = vec![
            Alarm::new("X", "A1930 AGW fault"),
            Alarm::new("Y", "A1930 AGW fault").with_sector(Field::Exchange),
        ];
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        assert_eq!(report.failure_points.len(), 2);
        assert!(report
            .failure_points
            .iter()
            .all(|p| p.failure_type == "Exchange A1930 standalone failure"));
    }

    #[test]
    fn test_exchange_a1930_marks_upper_exchange() {
        let nodes = vec![
            node("UP", Field::Exchange, 0),
            node("X", Field::Exchange, 1),
            node("IP1", Field::Ip, 1),
            node("Z", Field::Ip, 2),
        ];
        let mut alarms: Vec<Alarm> = (0..11).map(|_| Alarm::new("X", "A1930 AGW fault")).collect();
        alarms.push(Alarm::new("UP", "trunk degraded"));
        alarms.push(Alarm::new("IP1", "port down"));
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        let up = report.failure_points.iter().find(|p| p.target_id == "UP").unwrap();
        assert_eq!(up.failure_type, "Exchange A1930 upstream failure");
        assert_eq!(up.confidence, A1930_UPSTREAM_CONFIDENCE);
        let x = report.failure_points.iter().find(|p| p.target_id == "X").unwrap();
        assert_eq!(x.failure_type, "Exchange failure");
    }

    #[test]
    fn test_transmission_los_and_lof() {
        let nodes = vec![
            node("T", Field::Ip, 0),
            node("R1", Field::Transmission, 1),
            node("R2", Field::Transmission, 1),
            node("R3", Field::Transmission, 1),
        ];
        let alarms = vec![
            Alarm::new("R1", "LOS on port 3"),
            Alarm::new("R2", "LOF detected"),
            Alarm::new("R3", "AIS"),
        ];
        let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
            .analyze(&AnalysisSnapshot::new(nodes, Vec::new(), alarms));

        let types: Vec<&str> = report.failure_points.iter().map(|p| p.failure_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["Transmission LOS failure", "Transmission LOF failure", "Transmission failure"]
        );
        assert_eq!(report.summary.transmission_failures, 3);
    }

    #[test]
    fn test_valid_alarms_only() {
        let nodes = vec![node("T", Field::Transmission, 0)];
        let alarms = vec![Alarm::new("T", "LOS").with_validity(false)];
        let snapshot = AnalysisSnapshot::new(nodes, Vec::new(), alarms);

        let lenient = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default());
        assert_eq!(lenient.analyze(&snapshot).failure_points.len(), 1);

        let strict = FaultCorrelationEngine::without_telemetry(CorrelationSettings {
            valid_alarms_only: true,
            ..Default::default()
        });
        assert!(strict.analyze(&snapshot).is_empty());
    }

    #[test]
    fn test_parallel_checks_keep_order() {
        let nodes: Vec<EquipmentNode> = (0..8).map(|i| node(&format!("M{}", i), Field::Mw, i.min(1))).collect();
        let alarms: Vec<Alarm> = nodes.iter().map(|n| Alarm::new(n.id.clone(), "RSL low")).collect();
        let snapshot = AnalysisSnapshot::new(nodes, Vec::new(), alarms);

        let mut telemetry = MockTelemetryClient::new();
        telemetry
            .expect_check_power()
            .times(8)
            .returning(|id, _| {
                let index: u32 = id[1..].parse().unwrap_or(0);
                Ok(if index % 2 == 0 { PowerStatus::Battery } else { PowerStatus::Mains })
            });
        let engine = FaultCorrelationEngine::new(
            CorrelationSettings {
                telemetry_concurrency: 3,
                ..Default::default()
            },
            Arc::new(telemetry),
        );

        let report = engine.analyze(&snapshot);
        let ids: Vec<&str> = report
            .failure_points
            .iter()
            .filter(|p| p.category == FailureCategory::MwFailure)
            .map(|p| p.target_id.as_str())
            .collect();
        assert_eq!(ids, vec!["M0", "M2", "M4", "M6"]);
    }

    #[test]
    fn test_progress_is_reported_per_stage() {
        let engine = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default());
        let mut messages = Vec::new();
        engine.analyze_with_progress(&mw_scenario(), &mut |m| messages.push(m.to_string()));

        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], "Checking line failures");
        assert!(messages[5].contains("failure points"));
    }

    proptest! {
        #[test]
        fn prop_each_element_classified_at_most_once(
            specs in prop::collection::vec((0usize..6, 0u32..4, any::<bool>()), 1..25),
            edges in prop::collection::vec((0usize..25, 0usize..25), 0..30),
        ) {
            let fields = [Field::Mw, Field::Line, Field::Transmission, Field::Ip, Field::Wireless, Field::Exchange];
            let nodes: Vec<EquipmentNode> = specs
                .iter()
                .enumerate()
                .map(|(i, (f, level, _))| node(&format!("N{}", i), fields[*f], *level))
                .collect();
            let alarms: Vec<Alarm> = specs
                .iter()
                .enumerate()
                .filter(|(_, (_, _, alarmed))| *alarmed)
                .map(|(i, _)| Alarm::new(format!("N{}", i), "LOS"))
                .collect();
            let mut seen = HashSet::new();
            let links: Vec<Link> = edges
                .iter()
                .map(|&(a, b)| (a % nodes.len(), b % nodes.len()))
                .filter(|(a, b)| a != b && seen.insert(link_id(&nodes[*a].id, &nodes[*b].id)))
                .map(|(a, b)| link(&nodes, a, b, ""))
                .collect();

            let report = FaultCorrelationEngine::without_telemetry(CorrelationSettings::default())
                .analyze(&AnalysisSnapshot::new(nodes, links, alarms.clone()));

            let mut keys = HashSet::new();
            for point in &report.failure_points {
                prop_assert!(keys.insert((point.kind, point.target_id.clone())));
            }
            prop_assert_eq!(report.summary.total_failure_points, report.failure_points.len());
            if alarms.is_empty() {
                prop_assert!(report.is_empty());
            }
        }
    }
}
