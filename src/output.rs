//! Result of a successful analysis.

use crate::error::AnalysisError;
use crate::pipeline::inference::AnalyzeImageOutput;
use serde::{Deserialize, Serialize};

/// Non-empty text returned by the model, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub text: String,
    /// Wall-clock time of the inference round trip.
    pub duration_ms: u64,
}

impl AnalysisResult {
    /// Validate a model output, rejecting an empty or missing `analysisResult`.
    pub fn from_output(output: AnalyzeImageOutput, duration_ms: u64) -> Result<Self, AnalysisError> {
        if output.analysis_result.is_empty() {
            return Err(AnalysisError::EmptyResult);
        }
        Ok(Self {
            text: output.analysis_result,
            duration_ms,
        })
    }
}

impl From<AnalysisResult> for AnalyzeImageOutput {
    fn from(result: AnalysisResult) -> Self {
        AnalyzeImageOutput {
            analysis_result: result.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_rejected() {
        let out = AnalyzeImageOutput {
            analysis_result: String::new(),
        };
        assert_eq!(
            AnalysisResult::from_output(out, 0),
            Err(AnalysisError::EmptyResult)
        );
    }

    #[test]
    fn blank_text_passes_through() {
        let out = AnalyzeImageOutput {
            analysis_result: "   \n".into(),
        };
        let result = AnalysisResult::from_output(out, 3).unwrap();
        assert_eq!(result.text, "   \n");
    }

    #[test]
    fn text_is_not_trimmed() {
        let out = AnalyzeImageOutput {
            analysis_result: "  Answer: B\n".into(),
        };
        let result = AnalysisResult::from_output(out, 12).unwrap();
        assert_eq!(result.text, "  Answer: B\n");
        assert_eq!(result.duration_ms, 12);
    }
}
