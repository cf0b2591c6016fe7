//! # edgequake-image-insights
//!
//! Read the text in a photo, and answer the question in it, with a Vision
//! Language Model (VLM).
//!
//! ## Why this crate?
//!
//! Photos of worksheets, slides and exam questions come straight off phone
//! cameras at 12 MP and more. Sending them as-is wastes upload time and
//! tokens, and a malformed payload or an empty model reply tends to surface
//! as an opaque provider error. This crate normalises the photo first, checks
//! the request locally, and turns every outcome into either one text result
//! or one error from a small, stable taxonomy.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo bytes
//!  │
//!  ├─ 1. Load       check mime/size, decode (spawn_blocking)
//!  ├─ 2. Normalize  longest edge ≤ 1024 px, JPEG q=0.7, data URI
//!  ├─ 3. Request    validate data:<mime>;base64,<payload> locally
//!  ├─ 4. VLM        one structured call via edgequake-llm
//!  └─ 5. Classify   AnalysisResult, or AnalysisError + ErrorKind
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_image_insights::{analyze_image, AnalysisConfig, AnalyzeImageInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let input = AnalyzeImageInput::new("data:image/jpeg;base64,/9j/4AAQ...");
//!     let output = analyze_image(input, &config).await?;
//!     println!("{}", output.analysis_result);
//!     Ok(())
//! }
//! ```
//!
//! For an interactive front end, drive a [`Workbench`]: it owns the current
//! selection and discards results that belong to a photo the user has
//! already replaced.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod workbench;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_image, analyze_image_with, AnalysisClient};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, CompressionDegraded, ConfigError, ErrorKind, InferenceError};
pub use output::AnalysisResult;
pub use pipeline::classify::{classify, Notice, Severity};
pub use pipeline::inference::{
    AnalyzeImageInput, AnalyzeImageOutput, LlmInference, StructuredInference,
};
pub use pipeline::load::{load_image, DecodedBitmap, RawImageFile};
pub use pipeline::normalize::{
    normalize, target_dimensions, JpegSurface, Normalized, NormalizedImage, RenderSurface,
    SurfaceError,
};
pub use pipeline::request::AnalysisRequest;
pub use session::{Generation, Outcome, Session, SessionEvent, SessionState, TransitionError};
pub use workbench::Workbench;
