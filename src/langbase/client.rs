use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::types::{
    CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse, PipeTool,
};
use crate::config::{LangbaseConfig, RequestConfig};
use crate::error::{TransportError, TransportResult};
use crate::generation::{GenerationBackend, GenerationRequest};

/// Client for interacting with Langbase Pipes API
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: &RequestConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Run a pipe once. Retrying is the caller's concern.
    pub async fn call_pipe(&self, request: &PipeRequest) -> TransportResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);

        debug!(
            pipe = %request.name,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling Langbase pipe"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json::<PipeResponse>()
            .await
            .map_err(|e| TransportError::InvalidEnvelope {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new pipe
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> TransportResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);

        info!(pipe = %request.name, "Creating Langbase pipe");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: CreatePipeResponse =
            response
                .json()
                .await
                .map_err(|e| TransportError::InvalidEnvelope {
                    message: format!("Failed to parse create pipe response: {}", e),
                })?;

        info!(pipe = %pipe_response.name, "Pipe created successfully");

        Ok(pipe_response)
    }

    /// Ensure a JSON-mode pipe exists, creating it if needed
    pub async fn ensure_pipe(
        &self,
        pipe_name: &str,
        description: &str,
        model: &str,
    ) -> TransportResult<()> {
        let request = CreatePipeRequest::new(pipe_name)
            .with_description(description)
            .with_model(model)
            .with_upsert(true)
            .with_json_output(true)
            .with_temperature(0.4);

        match self.create_pipe(request).await {
            Ok(_) => {
                info!(pipe = %pipe_name, "Pipe ready");
                Ok(())
            }
            Err(TransportError::Api { status: 409, .. }) => {
                // Pipe already exists, that's fine
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl GenerationBackend for LangbaseClient {
    async fn complete(&self, request: &GenerationRequest) -> TransportResult<String> {
        let pipe_request = PipeRequest::new(
            &request.pipe,
            vec![
                Message::system(&request.system),
                Message::user(&request.prompt),
            ],
        )
        .with_tools(request.tools.iter().copied().map(PipeTool::from));

        let start = Instant::now();
        let response = self.call_pipe(&pipe_request).await?;

        debug!(
            step = %request.step,
            pipe = %request.pipe,
            latency_ms = start.elapsed().as_millis(),
            model = ?response.raw.as_ref().and_then(|r| r.model.as_deref()),
            "Langbase pipe returned"
        );

        if !response.success {
            return Err(TransportError::Rejected {
                message: response
                    .completion
                    .chars()
                    .take(200)
                    .collect::<String>(),
            });
        }

        Ok(response.completion)
    }
}
