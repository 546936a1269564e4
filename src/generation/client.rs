use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{parse_structured, GenerationBackend, GenerationRequest, RetryPolicy, Sleeper};
use super::{StructuredOutput, TokioSleeper};
use crate::error::{GenerationError, GenerationResult};

/// Structured generation client with bounded retry.
///
/// Cheap to clone; the backend and sleeper are shared.
#[derive(Clone)]
pub struct StructuredClient {
    backend: Arc<dyn GenerationBackend>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl StructuredClient {
    /// Create a client that sleeps on the tokio timer between retries.
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    /// Replace the sleeper (tests inject a recording fake).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Generate with the policy's attempt budget.
    pub async fn generate<T: StructuredOutput>(
        &self,
        request: &GenerationRequest,
    ) -> GenerationResult<T> {
        self.generate_with_attempts(request, self.policy.max_attempts)
            .await
    }

    /// Generate structured data, retrying transport failures up to
    /// `max_attempts` times in total.
    ///
    /// A completion that does not parse into `T` fails immediately with
    /// [`GenerationError::InvalidStructure`]; it is not retried.
    pub async fn generate_with_attempts<T: StructuredOutput>(
        &self,
        request: &GenerationRequest,
        max_attempts: u32,
    ) -> GenerationResult<T> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match self.backend.complete(request).await {
                Ok(completion) => {
                    let latency = start.elapsed();
                    return match parse_structured::<T>(&completion) {
                        Ok(value) => {
                            info!(
                                step = %request.step,
                                attempt,
                                latency_ms = latency.as_millis(),
                                "Structured generation succeeded"
                            );
                            Ok(value)
                        }
                        Err(message) => {
                            error!(
                                step = %request.step,
                                attempt,
                                error = %message,
                                completion_preview = %completion.chars().take(200).collect::<String>(),
                                "Model returned an invalid structure"
                            );
                            Err(GenerationError::InvalidStructure { message })
                        }
                    };
                }
                Err(e) => {
                    error!(
                        step = %request.step,
                        attempt,
                        max_attempts,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        "Generation attempt failed"
                    );

                    if attempt >= max_attempts {
                        return Err(GenerationError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        step = %request.step,
                        retry = attempt,
                        delay_ms = delay.as_millis(),
                        "Retrying generation request"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}
