//! Dashboard context
//!
//! [`DashboardContext`] is the caller-owned value that threads one target
//! selection through graph build, layout, relaxation and fault analysis. Every
//! selection advances a [`Generation`]; graphs and analysis results produced
//! for an older generation are discarded when they arrive.
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::app::DashboardContext;
//!
//! let mut context = DashboardContext::new(config, collaborators, directory);
//! let highlights = context.subscribe();
//!
//! context.select_target("EQ-100", Instant::now())?;
//! while context.tick(Instant::now()).is_some_and(|s| s.is_running()) {}
//!
//! context.start_analysis()?;
//! if let AnalysisPoll::Finished(outcome) = context.wait_analysis() {
//!     println!("{:?}", outcome.report());
//! }
//! ```

use crate::backend::Collaborators;
use crate::config::DashboardConfig;
use crate::correlation::{AnalysisSnapshot, CorrelationReport};
use crate::error::{DashboardError, Result};
use crate::events::{EventBus, InteractionEvent};
use crate::layout::{Canvas, LayoutEngine, Relaxation, RelaxationState, StopReason};
use crate::session::{
    AnalysisSessionCoordinator, Generation, GenerationCounter, SessionEvent, SessionHandle,
    SessionOutcome,
};
use crate::topology::{AlarmDirectory, TopologyGraph, TopologyGraphBuilder};
use crate::types::{FailurePoint, Point};
use crossbeam_channel::Receiver;
use std::time::Instant;

/// The graph currently on screen
#[derive(Debug)]
pub struct TopologyView {
    generation: Generation,
    graph: TopologyGraph,
    relaxation: Option<Relaxation>,
    dragging: Option<String>,
}

impl TopologyView {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn relaxation_state(&self) -> Option<RelaxationState> {
        self.relaxation.as_ref().map(Relaxation::state)
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    fn stop_relaxation(&mut self, reason: StopReason) {
        if let Some(relaxation) = self.relaxation.as_mut() {
            relaxation.stop(&mut self.graph, reason);
        }
    }
}

/// Result of polling the running analysis
#[derive(Debug)]
pub enum AnalysisPoll {
    /// No analysis was started
    Idle,
    /// Still running
    Running,
    /// Finished for the current selection
    Finished(SessionOutcome),
    /// Finished, but the selection has changed since it started
    Discarded,
}

// ==================== Context ====================

pub struct DashboardContext {
    config: DashboardConfig,
    collaborators: Collaborators,
    directory: AlarmDirectory,
    builder: TopologyGraphBuilder,
    layout: LayoutEngine,
    coordinator: AnalysisSessionCoordinator,
    generations: GenerationCounter,
    events: EventBus,
    view: Option<TopologyView>,
    analysis: Option<SessionHandle>,
    progress: Vec<String>,
    failure_points: Vec<FailurePoint>,
    hovered: Option<String>,
}

impl DashboardContext {
    pub fn new(config: DashboardConfig, collaborators: Collaborators, directory: AlarmDirectory) -> Self {
        let builder = TopologyGraphBuilder::new(config.topology.clone());
        let layout = LayoutEngine::new(config.layout.clone());
        let coordinator =
            AnalysisSessionCoordinator::new(collaborators.transport.clone(), config.session.clone());
        Self {
            config,
            collaborators,
            directory,
            builder,
            layout,
            coordinator,
            generations: GenerationCounter::new(),
            events: EventBus::new(),
            view: None,
            analysis: None,
            progress: Vec::new(),
            failure_points: Vec::new(),
            hovered: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn directory(&self) -> &AlarmDirectory {
        &self.directory
    }

    /// Replace the alarm list and equipment directory used by later builds
    pub fn set_directory(&mut self, directory: AlarmDirectory) {
        self.directory = directory;
    }

    pub fn subscribe(&mut self) -> Receiver<InteractionEvent> {
        self.events.subscribe()
    }

    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.config.topology.canvas_width, self.config.topology.canvas_height)
    }

    pub fn current_generation(&self) -> Generation {
        self.generations.current()
    }

    pub fn view(&self) -> Option<&TopologyView> {
        self.view.as_ref()
    }

    pub fn graph(&self) -> Option<&TopologyGraph> {
        self.view.as_ref().map(TopologyView::graph)
    }

    /// Failure points of the last analysis completed for the current selection
    pub fn failure_points(&self) -> &[FailurePoint] {
        &self.failure_points
    }

    /// Progress messages of the running (or last) analysis
    pub fn progress(&self) -> &[String] {
        &self.progress
    }

    pub fn is_analysis_running(&self) -> bool {
        self.analysis.is_some()
    }

    // ==================== Selection ====================

    /// Begin a new selection, invalidating the current view
    pub fn begin_selection(&mut self) -> Generation {
        if let Some(mut view) = self.view.take() {
            view.stop_relaxation(StopReason::TargetChanged);
        }
        self.failure_points.clear();
        self.generations.advance()
    }

    /// Build and lay out the graph of a target without touching the view
    pub fn prepare_graph(&self, target_id: &str) -> Result<TopologyGraph> {
        let mut graph =
            self.builder
                .build(target_id, &self.directory, self.collaborators.topology.as_ref())?;
        self.layout.apply(&mut graph, self.canvas());
        Ok(graph)
    }

    /// Install a prepared graph, unless a newer selection has started
    pub fn install_graph(&mut self, generation: Generation, graph: TopologyGraph, now: Instant) -> bool {
        if !self.generations.is_current(generation) {
            tracing::debug!(
                "Discarding graph of {} from stale generation {:?}",
                graph.target_id,
                generation
            );
            return false;
        }

        let relaxation =
            Relaxation::start(&graph, self.config.relaxation.clone(), self.canvas().center(), now);
        tracing::info!(
            "Showing {} ({} nodes, {} links)",
            graph.target_id,
            graph.node_count(),
            graph.links.len()
        );
        self.view = Some(TopologyView {
            generation,
            graph,
            relaxation,
            dragging: None,
        });
        true
    }

    /// Select a target: build, lay out and start relaxing its neighborhood
    pub fn select_target(&mut self, target_id: &str, now: Instant) -> Result<Generation> {
        let generation = self.begin_selection();
        let graph = self.prepare_graph(target_id)?;
        self.install_graph(generation, graph, now);
        Ok(generation)
    }

    /// Advance the relaxation by one frame
    pub fn tick(&mut self, now: Instant) -> Option<RelaxationState> {
        let view = self.view.as_mut()?;
        let relaxation = view.relaxation.as_mut()?;
        Some(relaxation.tick(&mut view.graph, now))
    }

    /// Tear down the view
    pub fn close_view(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.stop_relaxation(StopReason::ViewClosed);
        }
        self.hover(None);
    }

    // ==================== Interaction ====================

    /// Start dragging a node; any running relaxation stops and freezes
    pub fn begin_drag(&mut self, node_id: &str) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if view.graph.index_of(node_id).is_none() {
            return false;
        }
        view.stop_relaxation(StopReason::DragStarted);
        view.dragging = Some(node_id.to_string());
        true
    }

    pub fn drag_to(&mut self, point: Point) {
        if let Some(view) = self.view.as_mut() {
            if let Some(id) = view.dragging.clone() {
                if let Some(node) = view.graph.node_mut(&id) {
                    node.pin_at(point);
                }
            }
        }
    }

    pub fn end_drag(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.dragging = None;
        }
    }

    /// Update the hovered element, publishing a change event
    pub fn hover(&mut self, element_id: Option<&str>) {
        let next = element_id.map(str::to_string);
        if next != self.hovered {
            self.hovered = next.clone();
            self.events.publish(InteractionEvent::HoverChanged(next));
        }
    }

    pub fn highlight(&mut self, element_id: &str) {
        self.events
            .publish(InteractionEvent::HighlightRequested(element_id.to_string()));
    }

    // ==================== Analysis ====================

    /// Submit the current graph and the full alarm list for fault analysis
    pub fn start_analysis(&mut self) -> Result<()> {
        let view = self
            .view
            .as_ref()
            .ok_or_else(|| DashboardError::NotFound("no topology selected".to_string()))?;
        let snapshot = AnalysisSnapshot::from_graph(&view.graph, self.directory.alarms());
        let handle = self.coordinator.submit(snapshot, view.generation)?;
        self.progress.clear();
        self.analysis = Some(handle);
        Ok(())
    }

    /// Collect pending analysis events without blocking
    pub fn poll_analysis(&mut self) -> AnalysisPoll {
        let Some(handle) = self.analysis.as_ref() else {
            return AnalysisPoll::Idle;
        };

        let mut finished = None;
        for event in handle.drain() {
            match event {
                SessionEvent::Progress {
                    generation, message, ..
                } => {
                    if self.generations.is_current(generation) {
                        self.progress.push(message);
                    }
                }
                SessionEvent::Finished {
                    generation, outcome, ..
                } => {
                    finished = Some((generation, outcome));
                    break;
                }
            }
        }

        match finished {
            Some((generation, outcome)) => {
                self.analysis = None;
                self.finish_analysis(generation, outcome)
            }
            None => AnalysisPoll::Running,
        }
    }

    /// Block until the running analysis finishes
    pub fn wait_analysis(&mut self) -> AnalysisPoll {
        let Some(handle) = self.analysis.take() else {
            return AnalysisPoll::Idle;
        };
        let generation = handle.generation();
        let outcome = handle.wait();
        self.finish_analysis(generation, outcome)
    }

    fn finish_analysis(&mut self, generation: Generation, outcome: SessionOutcome) -> AnalysisPoll {
        if !self.generations.is_current(generation) {
            tracing::debug!("Discarding analysis result of stale generation {:?}", generation);
            return AnalysisPoll::Discarded;
        }

        if let Some(report) = outcome.report() {
            self.apply_report(report);
        }
        AnalysisPoll::Finished(outcome)
    }

    fn apply_report(&mut self, report: &CorrelationReport) {
        self.failure_points = report.failure_points.clone();
        let ids: Vec<String> = report.implicated_ids().map(str::to_string).collect();
        for id in ids {
            self.events.publish(InteractionEvent::HighlightRequested(id));
        }
    }
}
