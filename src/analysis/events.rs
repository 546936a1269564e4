//! Progress events and their consumers.
//!
//! The orchestrator reports each finished phase to an [`AnalysisObserver`].
//! Buffered runs use [`NoopObserver`]; streaming runs forward events into a
//! channel. [`AnalysisAccumulator`] rebuilds the composite outcome on the
//! consuming side.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;

use super::types::{AgentReport, AnalysisOutcome, FinalVerdict, OrchestrationResult, Specialist};

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// Human-readable phase announcement.
    Status { message: String },
    /// Decomposition finished.
    Orchestration { data: OrchestrationResult },
    /// One specialist finished.
    AgentResult { name: Specialist, data: AgentReport },
    /// Synthesis finished.
    Synthesis { data: FinalVerdict },
    /// The run failed; no further events follow.
    Error { message: String },
}

impl AnalysisEvent {
    /// Shorthand for a status event.
    pub fn status(message: impl Into<String>) -> Self {
        AnalysisEvent::Status {
            message: message.into(),
        }
    }

    /// Wire tag of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisEvent::Status { .. } => "status",
            AnalysisEvent::Orchestration { .. } => "orchestration",
            AnalysisEvent::AgentResult { .. } => "agent_result",
            AnalysisEvent::Synthesis { .. } => "synthesis",
            AnalysisEvent::Error { .. } => "error",
        }
    }
}

/// Receives events as the pipeline advances.
pub trait AnalysisObserver: Send + Sync {
    /// Called once per event, in pipeline order.
    fn on_event(&self, event: AnalysisEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AnalysisObserver for NoopObserver {
    fn on_event(&self, _event: AnalysisEvent) {}
}

impl AnalysisObserver for mpsc::UnboundedSender<AnalysisEvent> {
    fn on_event(&self, event: AnalysisEvent) {
        if self.send(event).is_err() {
            warn!("Analysis event receiver dropped");
        }
    }
}

/// Why an event stream did not yield a complete outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incomplete {
    /// The stream ended with an error event.
    Failed { message: String },
    /// The stream ended without these pieces.
    Missing { parts: Vec<String> },
}

impl std::fmt::Display for Incomplete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Incomplete::Failed { message } => write!(f, "analysis failed: {}", message),
            Incomplete::Missing { parts } => {
                write!(f, "analysis stream incomplete, missing: {}", parts.join(", "))
            }
        }
    }
}

impl std::error::Error for Incomplete {}

/// Rebuilds an [`AnalysisOutcome`] from a sequence of events.
#[derive(Debug, Clone, Default)]
pub struct AnalysisAccumulator {
    orchestration: Option<OrchestrationResult>,
    agents: HashMap<Specialist, AgentReport>,
    verdict: Option<FinalVerdict>,
    error: Option<String>,
    statuses: Vec<String>,
}

impl AnalysisAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event in. A repeated `agent_result` replaces the earlier one.
    pub fn push(&mut self, event: AnalysisEvent) {
        match event {
            AnalysisEvent::Status { message } => self.statuses.push(message),
            AnalysisEvent::Orchestration { data } => self.orchestration = Some(data),
            AnalysisEvent::AgentResult { name, data } => {
                self.agents.insert(name, data);
            }
            AnalysisEvent::Synthesis { data } => self.verdict = Some(data),
            AnalysisEvent::Error { message } => self.error = Some(message),
        }
    }

    /// Status messages seen so far.
    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    /// Whether an error event was seen.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Assemble the outcome; reports in fixed specialist order.
    pub fn finish(mut self) -> Result<AnalysisOutcome, Incomplete> {
        if let Some(message) = self.error {
            return Err(Incomplete::Failed { message });
        }

        let mut parts = Vec::new();
        if self.orchestration.is_none() {
            parts.push("orchestration".to_string());
        }
        for specialist in Specialist::ALL {
            if !self.agents.contains_key(&specialist) {
                parts.push(format!("agent_result:{}", specialist));
            }
        }
        if self.verdict.is_none() {
            parts.push("synthesis".to_string());
        }

        match (self.orchestration, self.verdict) {
            (Some(orchestration), Some(verdict)) if parts.is_empty() => Ok(AnalysisOutcome {
                orchestration,
                agents: Specialist::ALL
                    .iter()
                    .filter_map(|s| self.agents.remove(s))
                    .collect(),
                verdict,
            }),
            _ => Err(Incomplete::Missing { parts }),
        }
    }
}

impl FromIterator<AnalysisEvent> for AnalysisAccumulator {
    fn from_iter<I: IntoIterator<Item = AnalysisEvent>>(iter: I) -> Self {
        let mut acc = Self::new();
        for event in iter {
            acc.push(event);
        }
        acc
    }
}
