//! Prompts for photo text extraction and question answering.
//!
//! Every prompt lives here so changing the model's behaviour means editing
//! exactly one place, and unit tests can inspect prompts without a VLM.
//!
//! Callers can override the instruction via
//! [`crate::config::AnalysisConfig::instruction`]; the output-format suffix is
//! always appended because the response parser depends on it.

/// Default instruction sent with every photo.
pub const ANALYZE_IMAGE_PROMPT: &str = r#"You are an AI assistant specialized in extracting text from images and answering questions based on that text. Your primary goal is to accurately read all text within the image.

If the image contains a question, especially a multiple-choice question (MCQ), identify the question and its options, and then provide the correct answer. Focus on accuracy for text extraction and answering questions. Do not provide general descriptions of the image."#;

/// Output-schema instruction appended to the system message.
///
/// Mirrors [`crate::pipeline::inference::AnalyzeImageOutput`].
pub const OUTPUT_SCHEMA_SUFFIX: &str = r#"

OUTPUT FORMAT
Respond with a single JSON object and nothing else:
{"analysisResult": "<the extracted text from the image, and if a question is present, the answer to that question>"}"#;

/// Build the full system message from an instruction.
pub fn system_message(instruction: &str) -> String {
    format!("{instruction}{OUTPUT_SCHEMA_SUFFIX}")
}
