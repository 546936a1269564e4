use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::agent::{SpecialistInvoker, UpstreamArtifact};
use super::events::{AnalysisEvent, AnalysisObserver, NoopObserver};
use super::types::{
    AgentReport, AnalysisOutcome, DecisionInput, FinalVerdict, OrchestrationResult, Specialist,
};
use crate::config::{Config, PipeConfig};
use crate::error::{AnalysisError, AnalysisResult, PromptResult, StepError, StepResult};
use crate::generation::{GenerationBackend, GenerationRequest, RetryPolicy, StructuredClient};
use crate::prompts::{with_language_directive, PromptStore, ORCHESTRATOR_TEMPLATE, SYNTHESIS_TEMPLATE};

/// Parallel group of specialists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Foundations,
    Challenge,
}

impl Wave {
    /// Run-level error for a member that failed.
    pub fn failure(self, specialist: Specialist, source: StepError) -> AnalysisError {
        match self {
            Wave::Foundations => AnalysisError::Foundation { specialist, source },
            Wave::Challenge => AnalysisError::Challenge { specialist, source },
        }
    }
}

/// Drives decomposition, the two specialist waves, and synthesis.
///
/// Holds no per-run state; one instance serves any number of runs.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    client: StructuredClient,
    prompts: PromptStore,
    invoker: Arc<SpecialistInvoker>,
    orchestrator_pipe: String,
    synthesis_pipe: String,
    timeout: Duration,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        client: StructuredClient,
        prompts: PromptStore,
        pipes: &PipeConfig,
        timeout: Duration,
    ) -> Self {
        let invoker = SpecialistInvoker::new(client.clone(), prompts.clone(), &pipes.agent);
        Self {
            client,
            prompts,
            invoker: Arc::new(invoker),
            orchestrator_pipe: pipes.orchestrator.clone(),
            synthesis_pipe: pipes.synthesis.clone(),
            timeout,
        }
    }

    /// Wire an orchestrator from configuration.
    ///
    /// Fails when a prompt override in `PROMPTS_DIR` cannot be read.
    pub fn from_config(
        backend: Arc<dyn GenerationBackend>,
        config: &Config,
    ) -> PromptResult<Self> {
        let client = StructuredClient::new(backend, RetryPolicy::from_config(&config.request));
        let prompts = PromptStore::from_dir(config.analysis.prompts_dir.as_deref())?;
        Ok(Self::new(
            client,
            prompts,
            &config.pipes,
            Duration::from_millis(config.analysis.timeout_ms),
        ))
    }

    /// Replace the overall wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a full analysis and return the composite outcome.
    pub async fn analyze(&self, input: &DecisionInput) -> AnalysisResult<AnalysisOutcome> {
        self.analyze_with_observer(input, &NoopObserver).await
    }

    /// Run a full analysis, reporting each finished phase to `observer`.
    ///
    /// On failure a single `error` event is emitted last.
    pub async fn analyze_with_observer(
        &self,
        input: &DecisionInput,
        observer: &dyn AnalysisObserver,
    ) -> AnalysisResult<AnalysisOutcome> {
        let start = Instant::now();
        let result = self.run(input, observer).await;

        match &result {
            Ok(outcome) => info!(
                critical_flaws = outcome.verdict.critical_flaws.len(),
                decision_paths = outcome.verdict.decision_paths.len(),
                latency_ms = start.elapsed().as_millis(),
                "Analysis completed"
            ),
            Err(e) => {
                error!(
                    phase = e.phase(),
                    error = %e,
                    latency_ms = start.elapsed().as_millis(),
                    "Analysis failed"
                );
                observer.on_event(AnalysisEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn run(
        &self,
        input: &DecisionInput,
        observer: &dyn AnalysisObserver,
    ) -> AnalysisResult<AnalysisOutcome> {
        input.validate()?;

        match tokio::time::timeout(self.timeout, self.pipeline(input, observer)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn pipeline(
        &self,
        input: &DecisionInput,
        observer: &dyn AnalysisObserver,
    ) -> AnalysisResult<AnalysisOutcome> {
        observer.on_event(AnalysisEvent::status("Initialization"));
        let context: Arc<str> = Arc::from(input.context());

        observer.on_event(AnalysisEvent::status("Decomposing the decision"));
        let orchestration = self
            .decompose(&context)
            .await
            .map_err(|source| AnalysisError::Orchestration { source })?;
        info!(
            assumptions = orchestration.assumptions.len(),
            "Decomposition completed"
        );
        observer.on_event(AnalysisEvent::Orchestration {
            data: orchestration.clone(),
        });

        observer.on_event(AnalysisEvent::status(
            "Foundations wave (logical, causal, risk)",
        ));
        let (logical, causal, risk) = tokio::try_join!(
            self.spawn_agent(Wave::Foundations, Specialist::Logical, &orchestration, &context),
            self.spawn_agent(Wave::Foundations, Specialist::Causal, &orchestration, &context),
            self.spawn_agent(Wave::Foundations, Specialist::Risk, &orchestration, &context),
        )?;
        info!("Foundations wave completed");
        let foundations = [&logical, &causal, &risk];
        for report in foundations {
            emit_report(observer, report);
        }

        observer.on_event(AnalysisEvent::status("Challenge wave (skeptic, stress)"));
        let (skeptic, stress) = tokio::try_join!(
            self.spawn_challenger(Specialist::Skeptic, &orchestration, &context, &foundations),
            self.spawn_challenger(Specialist::Stress, &orchestration, &context, &foundations),
        )?;
        info!("Challenge wave completed");
        for report in [&skeptic, &stress] {
            emit_report(observer, report);
        }

        observer.on_event(AnalysisEvent::status("Synthesis"));
        let agents = vec![logical, causal, risk, skeptic, stress];
        let verdict = self
            .synthesize(&orchestration, &agents)
            .await
            .map_err(|source| AnalysisError::Synthesis { source })?;
        observer.on_event(AnalysisEvent::Synthesis {
            data: verdict.clone(),
        });
        observer.on_event(AnalysisEvent::status("Analysis complete"));

        Ok(AnalysisOutcome {
            orchestration,
            agents,
            verdict,
        })
    }

    async fn decompose(&self, context: &str) -> StepResult<OrchestrationResult> {
        let system = with_language_directive(&self.prompts.get(ORCHESTRATOR_TEMPLATE)?);
        let request = GenerationRequest::new(
            "orchestrator",
            self.orchestrator_pipe.clone(),
            system,
            context,
        );
        Ok(self.client.generate(&request).await?)
    }

    async fn synthesize(
        &self,
        orchestration: &OrchestrationResult,
        agents: &[AgentReport],
    ) -> StepResult<FinalVerdict> {
        let system = with_language_directive(&self.prompts.get(SYNTHESIS_TEMPLATE)?);
        let prompt = format!(
            "ORCHESTRATOR REPORT: {}\nAGENT REPORTS: {}",
            serde_json::to_string(orchestration)?,
            serde_json::to_string(agents)?
        );
        let request = GenerationRequest::new("synthesis", self.synthesis_pipe.clone(), system, prompt);
        Ok(self.client.generate(&request).await?)
    }

    fn spawn_challenger(
        &self,
        specialist: Specialist,
        orchestration: &OrchestrationResult,
        context: &Arc<str>,
        foundations: &[&AgentReport],
    ) -> impl Future<Output = AnalysisResult<AgentReport>> {
        let artifact = specialist.upstream().and_then(|(source, framing)| {
            foundations
                .iter()
                .find(|report| report.agent_name == source)
                .map(|report| UpstreamArtifact::new(framing, (*report).clone()))
        });
        self.spawn(Wave::Challenge, specialist, orchestration, context, artifact)
    }

    fn spawn_agent(
        &self,
        wave: Wave,
        specialist: Specialist,
        orchestration: &OrchestrationResult,
        context: &Arc<str>,
    ) -> impl Future<Output = AnalysisResult<AgentReport>> {
        self.spawn(wave, specialist, orchestration, context, None)
    }

    /// Start the specialist on its own task.
    ///
    /// Dropping the returned future detaches the task instead of
    /// cancelling it, so a failed sibling never aborts requests in flight.
    fn spawn(
        &self,
        wave: Wave,
        specialist: Specialist,
        orchestration: &OrchestrationResult,
        context: &Arc<str>,
        upstream: Option<UpstreamArtifact>,
    ) -> impl Future<Output = AnalysisResult<AgentReport>> {
        let invoker = Arc::clone(&self.invoker);
        let mission = orchestration.agent_tasks.mission(specialist).to_string();
        let context = Arc::clone(context);

        let handle = tokio::spawn(async move {
            invoker
                .run_agent(specialist, &mission, &context, upstream.as_ref())
                .await
        });

        async move {
            match handle.await {
                Ok(Ok(report)) => Ok(report),
                Ok(Err(source)) => Err(wave.failure(specialist, source)),
                Err(join_error) => Err(wave.failure(
                    specialist,
                    StepError::Aborted {
                        message: join_error.to_string(),
                    },
                )),
            }
        }
    }
}

fn emit_report(observer: &dyn AnalysisObserver, report: &AgentReport) {
    observer.on_event(AnalysisEvent::AgentResult {
        name: report.agent_name,
        data: report.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MockGenerationBackend;

    fn orchestrator(mock: MockGenerationBackend) -> AnalysisOrchestrator {
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1));
        let client = StructuredClient::new(Arc::new(mock), policy);
        AnalysisOrchestrator::new(
            client,
            PromptStore::builtin(),
            &PipeConfig::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_wave_failure_mapping() {
        let err = Wave::Foundations.failure(
            Specialist::Causal,
            StepError::Aborted {
                message: "x".to_string(),
            },
        );
        assert!(matches!(
            err,
            AnalysisError::Foundation {
                specialist: Specialist::Causal,
                ..
            }
        ));
        let err = Wave::Challenge.failure(
            Specialist::Stress,
            StepError::Aborted {
                message: "x".to_string(),
            },
        );
        assert_eq!(err.phase(), "challenge");
    }

    #[tokio::test]
    async fn test_empty_decision_makes_no_calls() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_complete().times(0);

        let err = orchestrator(mock)
            .analyze(&DecisionInput::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_decomposition_is_orchestration_failure() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok(r#"{"decision_summary": "s"}"#.to_string()));

        let err = orchestrator(mock)
            .analyze(&DecisionInput::new("Quit my job"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Orchestration { .. }));
        assert!(err.to_string().contains("Invalid AI structure"));
    }
}
