//! Analysis entry points.
//!
//! [`AnalysisClient`] performs exactly one inference round trip for a
//! validated [`AnalysisRequest`]: no retries, no streaming, no partial
//! results. The terminal outcome is either an [`AnalysisResult`] or an
//! [`AnalysisError`], never both.
//!
//! [`analyze_image`] is the schema-level entry point:
//! `{photoDataUri} → {analysisResult}`.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, InferenceError};
use crate::output::AnalysisResult;
use crate::pipeline::classify::classify;
use crate::pipeline::inference::{
    AnalyzeImageInput, AnalyzeImageOutput, LlmInference, StructuredInference,
};
use crate::pipeline::request::AnalysisRequest;
use crate::prompts::ANALYZE_IMAGE_PROMPT;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Submits validated requests to a [`StructuredInference`] backend and
/// validates what comes back.
#[derive(Clone)]
pub struct AnalysisClient {
    inference: Arc<dyn StructuredInference>,
    instruction: String,
    timeout: Option<Duration>,
}

impl AnalysisClient {
    /// Client with the default instruction and no timeout.
    pub fn new(inference: Arc<dyn StructuredInference>) -> Self {
        Self {
            inference,
            instruction: ANALYZE_IMAGE_PROMPT.to_string(),
            timeout: None,
        }
    }

    /// Client honouring `config.instruction` and `config.api_timeout_secs`.
    pub fn with_config(inference: Arc<dyn StructuredInference>, config: &AnalysisConfig) -> Self {
        Self {
            inference,
            instruction: config
                .instruction
                .clone()
                .unwrap_or_else(|| ANALYZE_IMAGE_PROMPT.to_string()),
            timeout: config.api_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Client backed by the `edgequake-llm` provider the config resolves to.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let provider = resolve_provider(config).map_err(|e| classify(&e))?;
        let inference = Arc::new(LlmInference::new(provider, config));
        Ok(Self::with_config(inference, config))
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Run one analysis.
    ///
    /// # Errors
    /// - [`AnalysisError::EmptyResult`] — no structure, or an empty `analysisResult`
    /// - [`AnalysisError::ServiceInternal`] / [`AnalysisError::GenericAnalysis`] —
    ///   the backend failed (see [`classify`])
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        debug!("Submitting {:?}", request);

        let call = self.inference.submit(&self.instruction, request);
        let submitted = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| {
                    Err(InferenceError::Timeout {
                        secs: limit.as_secs(),
                    })
                }),
            None => call.await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let output = submitted
            .map_err(|e| classify(&e))?
            .ok_or(AnalysisError::EmptyResult)?;

        let result = AnalysisResult::from_output(output, duration_ms)?;
        info!(
            "Analysis complete: {} chars in {}ms",
            result.text.len(),
            duration_ms
        );
        Ok(result)
    }
}

/// Analyse one photo given as a data URI.
///
/// The URI is validated before a provider is even resolved, so a malformed
/// input never costs a network round trip.
///
/// # Example
/// ```rust,no_run
/// use edgequake_image_insights::{analyze_image, AnalysisConfig, AnalyzeImageInput};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let input = AnalyzeImageInput::new("data:image/jpeg;base64,/9j/4AAQ...");
/// let output = analyze_image(input, &AnalysisConfig::default()).await?;
/// println!("{}", output.analysis_result);
/// # Ok(())
/// # }
/// ```
pub async fn analyze_image(
    input: AnalyzeImageInput,
    config: &AnalysisConfig,
) -> Result<AnalyzeImageOutput, AnalysisError> {
    let request = AnalysisRequest::parse(input.photo_data_uri)?;
    let client = AnalysisClient::from_config(config)?;
    client.analyze(&request).await.map(Into::into)
}

/// [`analyze_image`] against an explicit inference backend.
pub async fn analyze_image_with(
    inference: Arc<dyn StructuredInference>,
    input: AnalyzeImageInput,
    config: &AnalysisConfig,
) -> Result<AnalyzeImageOutput, AnalysisError> {
    let request = AnalysisRequest::parse(input.photo_data_uri)?;
    AnalysisClient::with_config(inference, config)
        .analyze(&request)
        .await
        .map(Into::into)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, InferenceError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InferenceError::NotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — built by
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. **Auto-detection** ([`ProviderFactory::from_env`]) — first provider
///    with an API key present.
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, InferenceError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InferenceError::NotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
