//! Error classification: map inference failures onto the stable taxonomy.
//!
//! Providers report internal faults (safety filters, model crashes, gRPC
//! `INTERNAL`) with free-form messages. The marker is the only reliable
//! signal, so it is matched here once and nowhere else.

use crate::error::{
    AnalysisError, CompressionDegraded, ErrorKind, InferenceError, GENERIC_ANALYSIS_MESSAGE,
};
use serde::Serialize;
use tracing::warn;

/// Diagnostic marker that identifies a provider-side fault.
pub const INTERNAL_MARKER: &str = "INTERNAL";

/// Map an inference failure onto [`AnalysisError`].
///
/// - message contains [`INTERNAL_MARKER`] → [`AnalysisError::ServiceInternal`]
/// - anything else → [`AnalysisError::GenericAnalysis`] with the message
///   verbatim (or a fallback when the provider gave none)
pub fn classify(err: &InferenceError) -> AnalysisError {
    let message = err.to_string();
    let classified = if message.contains(INTERNAL_MARKER) {
        AnalysisError::ServiceInternal { detail: message }
    } else if message.trim().is_empty() {
        AnalysisError::GenericAnalysis {
            message: GENERIC_ANALYSIS_MESSAGE.to_string(),
        }
    } else {
        AnalysisError::GenericAnalysis { message }
    };
    warn!("Analysis failed ({}): {}", classified.kind(), err);
    classified
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A presentation-ready message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// `None` for purely informational notices.
    pub kind: Option<ErrorKind>,
    pub severity: Severity,
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    /// Shown when normalisation shrank the payload.
    pub fn compressed() -> Self {
        Self {
            kind: None,
            severity: Severity::Info,
            title: "Image Compressed",
            message: "Image size reduced for optimized analysis.".to_string(),
        }
    }
}

impl From<&AnalysisError> for Notice {
    fn from(err: &AnalysisError) -> Self {
        Self {
            kind: Some(err.kind()),
            severity: Severity::Error,
            title: "Analysis Error",
            message: err.to_string(),
        }
    }
}

impl From<&CompressionDegraded> for Notice {
    fn from(w: &CompressionDegraded) -> Self {
        Self {
            kind: Some(w.kind()),
            severity: Severity::Warning,
            title: "Compression Skipped",
            message: w.to_string(),
        }
    }
}
