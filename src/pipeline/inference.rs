//! Structured remote inference: the typed seam in front of the VLM.
//!
//! Business logic talks to [`StructuredInference`] only. The trait accepts an
//! instruction plus one embedded image and returns the output schema, or
//! `None` when the backend produced no structure at all. Schema parsing
//! happens here, at the boundary, so [`crate::analyze`] never looks at raw
//! model text.
//!
//! [`LlmInference`] is the production implementation over `edgequake-llm`.

use crate::config::AnalysisConfig;
use crate::error::InferenceError;
use crate::pipeline::request::AnalysisRequest;
use crate::prompts::system_message;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Input schema: one photo as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeImageInput {
    /// `data:<mimetype>;base64,<encoded_data>`.
    #[serde(rename = "photoDataUri")]
    pub photo_data_uri: String,
}

impl AnalyzeImageInput {
    pub fn new(photo_data_uri: impl Into<String>) -> Self {
        Self {
            photo_data_uri: photo_data_uri.into(),
        }
    }
}

/// Output schema: the extracted text, and the answer if a question was found.
///
/// A missing field deserialises to the empty string so that "field absent"
/// and "field empty" are rejected by the same check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeImageOutput {
    #[serde(rename = "analysisResult", default)]
    pub analysis_result: String,
}

/// A typed request/response contract with a generative backend.
#[async_trait]
pub trait StructuredInference: Send + Sync {
    /// Submit `instruction` with the image in `request`.
    ///
    /// `Ok(None)` means the backend answered but produced no structure
    /// matching [`AnalyzeImageOutput`].
    async fn submit(
        &self,
        instruction: &str,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalyzeImageOutput>, InferenceError>;
}

/// [`StructuredInference`] over any `edgequake-llm` vision provider.
///
/// The output schema is enforced by prompt (see
/// [`crate::prompts::OUTPUT_SCHEMA_SUFFIX`]) and checked by
/// [`parse_output`] on the way back.
pub struct LlmInference {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmInference {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl StructuredInference for LlmInference {
    async fn submit(
        &self,
        instruction: &str,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalyzeImageOutput>, InferenceError> {
        let system = system_message(instruction);
        let image = ImageData::new(request.payload().to_string(), request.mime().to_string())
            .with_detail("high");

        // The image carries all the content; the user turn needs no text.
        let messages = vec![
            ChatMessage::system(system.as_str()),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| InferenceError::Provider(e.to_string()))?;

        debug!(
            "VLM replied: {} input tokens, {} output tokens, {} chars",
            response.prompt_tokens,
            response.completion_tokens,
            response.content.len()
        );

        Ok(parse_output(&response.content))
    }
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// Models sometimes wrap JSON in a fence despite being told not to.
static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```$").unwrap());

/// Parse raw model text into the output schema.
///
/// Accepts a bare JSON object, a fenced one, or one embedded in surrounding
/// chatter. Anything else is `None`.
pub fn parse_output(content: &str) -> Option<AnalyzeImageOutput> {
    let trimmed = content.trim();
    let body = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str().trim());

    if let Ok(output) = serde_json::from_str::<AnalyzeImageOutput>(body) {
        return Some(output);
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<AnalyzeImageOutput>(&body[start..=end]).ok()
}
