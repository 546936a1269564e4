//! Data model for one analysis run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::generation::StructuredOutput;

/// The five fixed analytical perspectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialist {
    /// Coherence of the reasoning.
    Logical,
    /// Cause-and-effect chains.
    Causal,
    /// Exposure and failure modes.
    Risk,
    /// Contests the logical report.
    Skeptic,
    /// Amplifies the risk report.
    Stress,
}

impl Specialist {
    /// All specialists in reporting order.
    pub const ALL: [Specialist; 5] = [
        Specialist::Logical,
        Specialist::Causal,
        Specialist::Risk,
        Specialist::Skeptic,
        Specialist::Stress,
    ];

    /// First wave: no dependency between members.
    pub const FOUNDATIONS: [Specialist; 3] =
        [Specialist::Logical, Specialist::Causal, Specialist::Risk];

    /// Second wave: each member critiques one foundation report.
    pub const CHALLENGERS: [Specialist; 2] = [Specialist::Skeptic, Specialist::Stress];

    /// Get the specialist name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialist::Logical => "logical",
            Specialist::Causal => "causal",
            Specialist::Risk => "risk",
            Specialist::Skeptic => "skeptic",
            Specialist::Stress => "stress",
        }
    }

    /// The foundation report this specialist critiques, and how.
    pub fn upstream(&self) -> Option<(Specialist, Framing)> {
        match self {
            Specialist::Skeptic => Some((Specialist::Logical, Framing::Contest)),
            Specialist::Stress => Some((Specialist::Risk, Framing::Amplify)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Specialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Specialist {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "logical" => Ok(Specialist::Logical),
            "causal" => Ok(Specialist::Causal),
            "risk" => Ok(Specialist::Risk),
            "skeptic" => Ok(Specialist::Skeptic),
            "stress" => Ok(Specialist::Stress),
            _ => Err(format!("Unknown specialist: {}", s)),
        }
    }
}

/// How an upstream report is presented to a challenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// The report is to be attacked.
    Contest,
    /// The report's risks are to be pushed further.
    Amplify,
}

impl Framing {
    /// Heading placed before the embedded report.
    pub fn heading(&self) -> &'static str {
        match self {
            Framing::Contest => "LOGICAL REPORT TO CONTEST",
            Framing::Amplify => "RISK POINTS TO AMPLIFY",
        }
    }
}

/// The user's submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInput {
    /// The decision being considered.
    pub decision: String,
    /// Optional justification offered by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl DecisionInput {
    /// Create input with a decision and no reasoning.
    pub fn new(decision: impl Into<String>) -> Self {
        Self {
            decision: decision.into(),
            reasoning: None,
        }
    }

    /// Attach reasoning; blank reasoning is treated as absent.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        self.reasoning = if reasoning.trim().is_empty() {
            None
        } else {
            Some(reasoning)
        };
        self
    }

    /// Reject empty or whitespace-only decisions.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.decision.trim().is_empty() {
            return Err(AnalysisError::Validation {
                field: "decision".to_string(),
                reason: "Decision cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Shared context handed to every phase.
    pub fn context(&self) -> String {
        let reasoning = self
            .reasoning
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Not provided");
        format!(
            "DECISION: {}\nREASONING: {}",
            self.decision.trim(),
            reasoning
        )
    }
}

/// Output of the decomposition phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub decision_summary: String,
    #[serde(default)]
    pub assumptions: Vec<String>,
    pub agent_tasks: AgentTasks,
}

/// One mission per specialist; every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTasks {
    pub logical: String,
    pub causal: String,
    pub risk: String,
    pub skeptic: String,
    pub stress: String,
}

impl AgentTasks {
    /// Mission text for a specialist.
    pub fn mission(&self, specialist: Specialist) -> &str {
        match specialist {
            Specialist::Logical => &self.logical,
            Specialist::Causal => &self.causal,
            Specialist::Risk => &self.risk,
            Specialist::Skeptic => &self.skeptic,
            Specialist::Stress => &self.stress,
        }
    }
}

impl StructuredOutput for OrchestrationResult {
    fn validate(&self) -> Result<(), String> {
        let blank: Vec<&str> = Specialist::ALL
            .iter()
            .filter(|s| self.agent_tasks.mission(**s).trim().is_empty())
            .map(|s| s.as_str())
            .collect();
        if !blank.is_empty() {
            return Err(format!("empty mission for: {}", blank.join(", ")));
        }
        Ok(())
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

/// A single observation made by a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub point: String,
    pub explanation: String,
    pub severity: Severity,
    #[serde(default)]
    pub detailed_explanation: String,
}

/// A cause-and-effect link with a confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalElement {
    pub cause: String,
    pub effect: String,
    pub confidence: f64,
}

/// A specialist report as produced by the model.
///
/// `agent_name` is whatever the model wrote; the invoker replaces it with
/// the specialist it actually called.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedReport {
    #[serde(default)]
    pub agent_name: Option<String>,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub causal_elements: Option<Vec<CausalElement>>,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl StructuredOutput for GeneratedReport {
    fn validate(&self) -> Result<(), String> {
        for element in self.causal_elements.iter().flatten() {
            if !(0.0..=1.0).contains(&element.confidence) {
                return Err(format!(
                    "causal confidence {} outside [0, 1] for '{}'",
                    element.confidence, element.cause
                ));
            }
        }
        Ok(())
    }
}

/// Final report of one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent_name: Specialist,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causal_elements: Option<Vec<CausalElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl GeneratedReport {
    /// Attribute the report to the specialist that produced it.
    pub fn into_report(self, specialist: Specialist) -> AgentReport {
        AgentReport {
            agent_name: specialist,
            findings: self.findings,
            causal_elements: self.causal_elements,
            rationale: self.rationale,
        }
    }
}

impl AgentReport {
    /// Number of findings rated high.
    pub fn high_severity_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count()
    }
}

/// A flaw the synthesis considers decisive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalFlaw {
    pub title: String,
    pub impact: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub detailed_explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

/// A viable way forward and how robust it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPath {
    pub path: String,
    pub valid_if: String,
    pub fails_if: String,
    /// 0 to 100. Integer-valued floats such as `72.0` are accepted.
    #[serde(with = "robustness_score")]
    pub robustness_score: u8,
    #[serde(default)]
    pub detailed_explanation: String,
}

/// Serde adapter for [`DecisionPath::robustness_score`].
mod robustness_score {
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(score: &u8, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        score.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if value.fract() != 0.0 || !(0.0..=100.0).contains(&value) {
            return Err(de::Error::custom(format!(
                "robustness_score must be an integer from 0 to 100, got {}",
                value
            )));
        }
        Ok(value as u8)
    }
}

/// Output of the synthesis phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVerdict {
    #[serde(default)]
    pub critical_flaws: Vec<CriticalFlaw>,
    #[serde(default)]
    pub decision_paths: Vec<DecisionPath>,
    pub synthesis_summary: String,
}

impl StructuredOutput for FinalVerdict {
    fn validate(&self) -> Result<(), String> {
        if self.synthesis_summary.trim().is_empty() {
            return Err("synthesis_summary is empty".to_string());
        }
        Ok(())
    }
}

/// Everything one successful run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub orchestration: OrchestrationResult,
    /// Always five reports, in [`Specialist::ALL`] order.
    pub agents: Vec<AgentReport>,
    pub verdict: FinalVerdict,
}

impl AnalysisOutcome {
    /// Report of one specialist.
    pub fn report(&self, specialist: Specialist) -> Option<&AgentReport> {
        self.agents.iter().find(|r| r.agent_name == specialist)
    }
}

/// Outcome stamped by the caller with an id and completion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub id: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisResponse {
    /// Stamp an outcome with a fresh UUID and the current time.
    pub fn new(outcome: AnalysisOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            outcome,
            timestamp: Utc::now(),
        }
    }
}
