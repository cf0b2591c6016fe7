//! Configuration types for photo analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. One struct for every knob makes it trivial
//! to share a config between the loader, the normaliser and the client.

use crate::error::ConfigError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Longest edge of a normalised image, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Lossy re-encode quality on the 0–1 scale.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.7;

/// Raw inputs above this size are rejected before decoding (20 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 20 * 1024 * 1024;

/// Configuration for loading, normalising and analysing a photo.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_image_insights::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .max_dimension(768)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_dimension, 768);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Longest edge after normalisation. Default: 1024.
    ///
    /// Photos from phone cameras are routinely 4000 px and more; vision
    /// models tile them down anyway, so sending the full frame only costs
    /// upload time and tokens.
    pub max_dimension: u32,

    /// JPEG quality on the 0–1 scale. Default: 0.7.
    pub jpeg_quality: f32,

    /// Byte ceiling for the raw selected file. Default: 20 MiB.
    pub max_input_bytes: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription and answer selection want a deterministic model.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Custom instruction. If None, uses [`crate::prompts::ANALYZE_IMAGE_PROMPT`].
    pub instruction: Option<String>,

    /// Per-call timeout in seconds. Default: None (wait for the provider).
    pub api_timeout_secs: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 2048,
            instruction: None,
            api_timeout_secs: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("instruction", &self.instruction.as_ref().map(|s| s.len()))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Quality mapped onto the 1–100 scale the JPEG encoder expects.
    pub fn jpeg_quality_percent(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.clamp(16, 8192);
        self
    }

    pub fn jpeg_quality(mut self, q: f32) -> Self {
        self.config.jpeg_quality = q.clamp(0.01, 1.0);
        self
    }

    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn instruction(mut self, prompt: impl Into<String>) -> Self {
        self.config.instruction = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let c = &self.config;
        if c.max_input_bytes == 0 {
            return Err(ConfigError("max_input_bytes must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(ConfigError("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(ConfigError("api_timeout_secs must be ≥ 1".into()));
        }
        if let Some(ref instruction) = c.instruction {
            if instruction.trim().is_empty() {
                return Err(ConfigError("instruction must not be blank".into()));
            }
        }
        Ok(self.config)
    }
}
