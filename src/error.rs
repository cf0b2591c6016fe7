//! Error types for the edgequake-image-insights library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`AnalysisError`] — **Terminal**: the stage cannot produce its output
//!   (undecodable bytes, malformed data URI, empty model reply, provider
//!   fault). Returned as `Err(AnalysisError)`.
//!
//! * [`CompressionDegraded`] — **Non-fatal**: normalisation could not scale
//!   or re-encode the photo and fell back to the original encoding. Carried
//!   next to the [`crate::pipeline::normalize::NormalizedImage`] so analysis
//!   can still proceed.
//!
//! Every variant maps onto exactly one [`ErrorKind`], the small, stable tag
//! set a presentation layer switches on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message used when the model returned nothing usable.
pub const EMPTY_RESULT_MESSAGE: &str = "AI analysis did not return the expected result. \
The image might be unclear or contain content that could not be processed.";

/// Remediation hint shown for provider-side faults.
pub const SERVICE_INTERNAL_MESSAGE: &str = "The AI model could not process the request. \
This might be due to safety filters or an issue with the image content. \
Try a different image or adjust the image content.";

/// Fallback message when an inference failure carries no text.
pub const GENERIC_ANALYSIS_MESSAGE: &str = "Failed to analyze image. Please try again.";

/// Stable taxonomy tag for every failure (and the one warning) the pipeline
/// can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DecodeError,
    CompressionDegraded,
    InvalidRequestError,
    EmptyResultError,
    ServiceInternalError,
    GenericAnalysisError,
    NoImageSelected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::CompressionDegraded => "CompressionDegraded",
            ErrorKind::InvalidRequestError => "InvalidRequestError",
            ErrorKind::EmptyResultError => "EmptyResultError",
            ErrorKind::ServiceInternalError => "ServiceInternalError",
            ErrorKind::GenericAnalysisError => "GenericAnalysisError",
            ErrorKind::NoImageSelected => "NoImageSelected",
        }
    }

    /// `true` only for [`ErrorKind::CompressionDegraded`].
    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorKind::CompressionDegraded)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All terminal errors returned by the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    // ── Load / decode ─────────────────────────────────────────────────────
    /// The raw bytes could not be read from their source.
    #[error("Failed to read image file: {detail}")]
    ReadFailed { detail: String },

    /// Declared mime type is not `image/*`.
    #[error("Selected file is not an image (declared type '{mime}')")]
    NotAnImage { mime: String },

    /// Raw input exceeds the configured byte ceiling.
    #[error("Image is too large: {size} bytes exceeds the limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    /// Bytes could not be interpreted as an image.
    #[error("Failed to load image for processing: {detail}")]
    Decode { detail: String },

    // ── Request ───────────────────────────────────────────────────────────
    /// The data URI does not match `data:<mimetype>;base64,<encoded_data>`.
    #[error("Invalid image data URI: {reason}")]
    InvalidRequest { reason: String },

    /// Analysis was requested with no normalised image present.
    #[error("No image selected for analysis.")]
    NoImageSelected,

    // ── Inference ─────────────────────────────────────────────────────────
    /// The model returned no structure or an empty `analysisResult`.
    #[error("{}", EMPTY_RESULT_MESSAGE)]
    EmptyResult,

    /// The provider reported an internal fault.
    #[error("{}", SERVICE_INTERNAL_MESSAGE)]
    ServiceInternal { detail: String },

    /// Any other inference failure; `message` is shown verbatim.
    #[error("{message}")]
    GenericAnalysis { message: String },
}

impl AnalysisError {
    /// Taxonomy tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::ReadFailed { .. }
            | AnalysisError::NotAnImage { .. }
            | AnalysisError::InputTooLarge { .. }
            | AnalysisError::Decode { .. } => ErrorKind::DecodeError,
            AnalysisError::InvalidRequest { .. } => ErrorKind::InvalidRequestError,
            AnalysisError::NoImageSelected => ErrorKind::NoImageSelected,
            AnalysisError::EmptyResult => ErrorKind::EmptyResultError,
            AnalysisError::ServiceInternal { .. } => ErrorKind::ServiceInternalError,
            AnalysisError::GenericAnalysis { .. } => ErrorKind::GenericAnalysisError,
        }
    }
}

/// Non-fatal signal: the photo was passed through without scaling or
/// re-encoding.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Failed to process image for compression. Using original image. ({reason})")]
pub struct CompressionDegraded {
    pub reason: String,
}

impl CompressionDegraded {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CompressionDegraded
    }
}

/// Failure raised by a [`crate::pipeline::inference::StructuredInference`]
/// implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// The provider (or its transport) rejected the call.
    #[error("{0}")]
    Provider(String),

    /// No provider could be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    NotConfigured { provider: String, hint: String },

    /// The call did not complete within the configured timeout.
    #[error("Analysis timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Builder validation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);
