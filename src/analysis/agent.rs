use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

use super::types::{AgentReport, Framing, GeneratedReport, Specialist};
use crate::error::StepResult;
use crate::generation::{GenerationRequest, StructuredClient, ToolGrant};
use crate::prompts::{with_language_directive, PromptStore, AGENTS_TEMPLATE, AGENT_NAME_TOKEN};

/// Note appended to every specialist request body.
pub const SEARCH_NOTE: &str = "NOTE: You have access to a web search tool. Use it to verify facts and enrich your analysis.";

/// A foundation report handed to a challenger.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamArtifact {
    pub framing: Framing,
    pub report: AgentReport,
}

impl UpstreamArtifact {
    /// Wrap a report with the framing its challenger uses.
    pub fn new(framing: Framing, report: AgentReport) -> Self {
        Self { framing, report }
    }
}

/// Builds one specialist's request and obtains its report.
#[derive(Clone)]
pub struct SpecialistInvoker {
    client: StructuredClient,
    prompts: PromptStore,
    pipe: String,
}

impl SpecialistInvoker {
    /// Create an invoker that sends every specialist request to `pipe`.
    pub fn new(client: StructuredClient, prompts: PromptStore, pipe: impl Into<String>) -> Self {
        Self {
            client,
            prompts,
            pipe: pipe.into(),
        }
    }

    /// Run one specialist.
    ///
    /// Failures from the structured client are returned unchanged; the
    /// orchestrator decides what a failure means for the run.
    pub async fn run_agent(
        &self,
        specialist: Specialist,
        mission: &str,
        context: &str,
        upstream: Option<&UpstreamArtifact>,
    ) -> StepResult<AgentReport> {
        let start = Instant::now();
        let request = self.build_request(specialist, mission, context, upstream)?;

        debug!(
            specialist = %specialist,
            pipe = %self.pipe,
            has_upstream = upstream.is_some(),
            "Invoking specialist"
        );

        let generated: GeneratedReport = self.client.generate(&request).await?;
        let report = generated.into_report(specialist);

        info!(
            specialist = %specialist,
            findings = report.findings.len(),
            high_severity = report.high_severity_count(),
            latency_ms = start.elapsed().as_millis(),
            "Specialist completed"
        );

        Ok(report)
    }

    /// Compose the full request for a specialist.
    pub fn build_request(
        &self,
        specialist: Specialist,
        mission: &str,
        context: &str,
        upstream: Option<&UpstreamArtifact>,
    ) -> StepResult<GenerationRequest> {
        let substitutions = HashMap::from([(AGENT_NAME_TOKEN, specialist.as_str())]);
        let template = self.prompts.resolve(AGENTS_TEMPLATE, &substitutions)?;
        let system = with_language_directive(&template);

        let mut body = format!("SPECIFIC MISSION: {}\nCONTEXT: {}", mission.trim(), context);
        if let Some(artifact) = upstream {
            let report = serde_json::to_string(&artifact.report)?;
            body.push_str(&format!("\n\n{}: {}", artifact.framing.heading(), report));
        }
        body.push_str("\n\n");
        body.push_str(SEARCH_NOTE);

        Ok(GenerationRequest::new(
            format!("agent:{}", specialist),
            self.pipe.clone(),
            system,
            body,
        )
        .with_tool(ToolGrant::WebSearch))
    }
}
