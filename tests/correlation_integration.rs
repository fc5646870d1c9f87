//! Integration tests for fault correlation over built graphs

mod common;

use common::builders::{eq100_scenario, AlarmBuilder, NeighborhoodBuilder};
use netfault_rs::backend::{ScriptedTelemetry, StaticTopologyClient};
use netfault_rs::config::CorrelationSettings;
use netfault_rs::correlation::signal::{PowerSample, SignalSample};
use netfault_rs::correlation::{
    AnalysisSnapshot, FaultCorrelationEngine, SampledTelemetry, SignalSource,
};
use netfault_rs::error::{DashboardError, Result};
use netfault_rs::topology::{AlarmDirectory, NeighborhoodResponse, TopologyGraphBuilder};
use netfault_rs::types::{Direction, ElementKind, FailureCategory, Field};
use std::collections::HashSet;
use std::sync::Arc;

fn snapshot(response: NeighborhoodResponse, directory: &AlarmDirectory, target: &str) -> AnalysisSnapshot {
    let graph = TopologyGraphBuilder::default()
        .build(target, directory, &StaticTopologyClient::new(response))
        .unwrap();
    AnalysisSnapshot::from_graph(&graph, directory.alarms())
}

fn engine(telemetry: ScriptedTelemetry) -> FaultCorrelationEngine {
    FaultCorrelationEngine::new(CorrelationSettings::default(), Arc::new(telemetry))
}

#[test]
fn test_eq100_scenario_line_and_fading() {
    let (response, directory) = eq100_scenario();
    let snapshot = snapshot(response, &directory, "EQ-100");

    let report = engine(ScriptedTelemetry::new().with_fading("EQ-100", "EQ-200")).analyze(&snapshot);

    assert_eq!(report.failure_points.len(), 2);
    let line = &report.failure_points[0];
    assert_eq!((line.name.as_str(), line.category), ("L2", FailureCategory::LineFailure));
    assert_eq!(line.kind, ElementKind::Link);
    let fading = &report.failure_points[1];
    assert_eq!((fading.name.as_str(), fading.category), ("L1", FailureCategory::MwFailure));
    assert_eq!(fading.fading, Some(true));

    assert_eq!(report.summary.total_failure_points, 2);
    assert_eq!(report.summary.link_failures, 2);
    assert_eq!(report.analyzed_nodes, 3);
    assert_eq!(report.analyzed_alarms, 2);
}

#[test]
fn test_no_alarms_no_failure_points() {
    let (response, directory) = eq100_scenario();
    let quiet = AlarmDirectory::new(Vec::new(), directory.equipment().to_vec());
    let snapshot = snapshot(response, &quiet, "EQ-100");

    let report = engine(ScriptedTelemetry::new().with_fading("EQ-100", "EQ-200")).analyze(&snapshot);

    assert!(report.is_empty());
    assert_eq!(report.summary.total_failure_points, 0);
}

#[test]
fn test_unreachable_telemetry_is_counted_not_fatal() {
    let (response, directory) = eq100_scenario();
    let snapshot = snapshot(response, &directory, "EQ-100");

    let report = engine(ScriptedTelemetry::new().with_unreachable("EQ-200")).analyze(&snapshot);

    assert!(report.telemetry_failures > 0);
    assert!(report
        .failure_points
        .iter()
        .any(|p| p.category == FailureCategory::LineFailure));
    assert!(report.failure_points.iter().all(|p| p.fading != Some(true)));
}

#[test]
fn test_every_element_classified_at_most_once() {
    let (response, directory) = NeighborhoodBuilder::new()
        .equipment("T", Field::Ip)
        .equipment("M1", Field::Mw)
        .equipment("M2", Field::Mw)
        .equipment("X1", Field::Exchange)
        .equipment("R1", Field::Transmission)
        .connect("T", "M1", "m-hop", Direction::Up)
        .connect("M1", "M2", "radio", Direction::Up)
        .connect("T", "X1", "trunk", Direction::Down)
        .connect("T", "R1", "sdh", Direction::Down)
        .alarm(AlarmBuilder::new("M1").field(Field::Mw).build())
        .alarm(AlarmBuilder::new("M2").field(Field::Mw).build())
        .alarm(AlarmBuilder::new("X1").message("A1930 trunk fault").field(Field::Exchange).build())
        .alarm(AlarmBuilder::new("R1").message("LOS detected").field(Field::Transmission).build())
        .build();
    let snapshot = snapshot(response, &directory, "T");

    let telemetry = ScriptedTelemetry::new().with_fading("M1", "M2").with_battery("M2");
    let report = engine(telemetry).analyze(&snapshot);

    assert!(!report.is_empty());
    let mut seen = HashSet::new();
    for point in &report.failure_points {
        assert!(
            seen.insert((point.kind, point.target_id.clone())),
            "{} classified twice",
            point.target_id
        );
    }
    assert_eq!(report.summary.total_failure_points, report.failure_points.len());
}

struct FixedSignals;

impl SignalSource for FixedSignals {
    fn signal_samples(&self, source_id: &str, target_id: &str) -> Result<Vec<SignalSample>> {
        if source_id == "EQ-100" && target_id == "EQ-200" {
            Ok(vec![
                SignalSample { snr_db: 18.0, ber: 3e-4 },
                SignalSample { snr_db: 21.0, ber: 2e-4 },
            ])
        } else {
            Err(DashboardError::NotFound(format!("{} - {}", source_id, target_id)))
        }
    }

    fn power_sample(&self, _equip_id: &str, _site: &str) -> Result<PowerSample> {
        Ok(PowerSample {
            input_voltage: 221.0,
            status: "normal".to_string(),
        })
    }
}

#[test]
fn test_sampled_telemetry_drives_fading_stage() {
    let (response, directory) = eq100_scenario();
    let snapshot = snapshot(response, &directory, "EQ-100");

    let engine = FaultCorrelationEngine::new(
        CorrelationSettings::default(),
        Arc::new(SampledTelemetry::new(FixedSignals)),
    );
    let report = engine.analyze(&snapshot);

    assert_eq!(report.summary.mw_fading_failures, 1);
    assert_eq!(report.summary.mw_voltage_failures, 0);
}
