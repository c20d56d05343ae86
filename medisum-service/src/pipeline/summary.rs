use std::time::Instant;
use tracing::{info, warn};

use super::extract::{Extraction, extract_text};
use super::prompt::{build_document_prompt, build_prompt};
use crate::error::{Result, SummaryError};
use crate::model::{GenerationParams, LoadedModel, ModelSlot};
use crate::models::{
    DEFAULT_TEMPERATURE, DocumentSummaryResult, DocumentUploadRequest, GenerationRequest,
    GenerationResult, Perspective,
};

// Confidence and safety scores are fixed placeholders; nothing computes them.
pub const QA_CONFIDENCE: f64 = 0.85;
pub const QA_SAFETY_SCORE: f64 = 0.95;
pub const DOCUMENT_CONFIDENCE: f64 = 0.88;
pub const DOCUMENT_SAFETY_SCORE: f64 = 0.96;

/// Returned as the summary when the model produced no text.
pub const EMPTY_SUMMARY: &str = "Failed to generate summary";

pub const PREVIEW_CHARS: usize = 500;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Prompt construction, model invocation and response shaping.
#[derive(Clone)]
pub struct SummaryPipeline {
    model: ModelSlot,
}

impl SummaryPipeline {
    pub fn new(model: ModelSlot) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelSlot {
        &self.model
    }

    /// Summarizes a question/answer pair.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let model = self.loaded_model()?;
        let perspective: Perspective = request.perspective.parse()?;
        check_max_length("max_tokens", request.max_tokens)?;
        check_temperature(request.temperature)?;

        let start = Instant::now();
        let prompt = build_prompt(&request.question, &request.answer, perspective);
        let params = GenerationParams::sampled(request.max_tokens, request.temperature);
        let summary = run_model(model, &prompt, &params).await?;
        let processing_time = start.elapsed().as_secs_f64();

        info!(
            %perspective,
            processing_time, "Generated summary for Q&A request"
        );

        Ok(GenerationResult {
            summary,
            confidence: QA_CONFIDENCE,
            processing_time,
            safety_score: QA_SAFETY_SCORE,
            perspective,
        })
    }

    /// Extracts text from an uploaded PDF and summarizes it.
    pub async fn generate_from_document(
        &self,
        request: &DocumentUploadRequest,
    ) -> Result<DocumentSummaryResult> {
        let model = self.loaded_model()?;
        let perspective: Perspective = request.perspective.parse()?;
        if request.pdf_content.is_empty() {
            return Err(SummaryError::InvalidInput(
                "No PDF content provided".to_string(),
            ));
        }
        check_max_length("max_length", request.max_length)?;

        let start = Instant::now();
        let pdf_content = request.pdf_content.clone();
        let extraction = tokio::task::spawn_blocking(move || extract_text(&pdf_content))
            .await
            .map_err(|e| SummaryError::GenerationFailure(e.to_string()))?;
        if let Extraction::FellBack(reason) = &extraction {
            warn!("Summarizing fallback document ({})", reason);
        }

        let text = extraction.text();
        let prompt = build_document_prompt(text, perspective);
        let params = GenerationParams::sampled(request.max_length, DEFAULT_TEMPERATURE);
        let summary = run_model(model, &prompt, &params).await?;
        let processing_time = start.elapsed().as_secs_f64();

        info!(
            %perspective,
            processing_time,
            fallback = extraction.is_fallback(),
            "Generated summary for PDF upload"
        );

        Ok(DocumentSummaryResult {
            summary,
            extracted_text: preview(text),
            confidence: DOCUMENT_CONFIDENCE,
            processing_time,
            safety_score: DOCUMENT_SAFETY_SCORE,
            perspective,
            file_size: request.pdf_content.len(),
            text_length: text.chars().count(),
        })
    }

    fn loaded_model(&self) -> Result<&LoadedModel> {
        self.model.get().ok_or(SummaryError::NotLoaded)
    }
}

async fn run_model(model: &LoadedModel, prompt: &str, params: &GenerationParams) -> Result<String> {
    let output = model.generator.generate(prompt, params).await?;
    if output.trim().is_empty() {
        warn!("Model returned no text");
        return Ok(EMPTY_SUMMARY.to_string());
    }
    Ok(output)
}

fn check_max_length(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(SummaryError::InvalidInput(format!(
            "{} must be a positive integer",
            field
        )));
    }
    Ok(())
}

fn check_temperature(temperature: f64) -> Result<()> {
    if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(SummaryError::InvalidInput(format!(
            "temperature must be between 0 and {}",
            MAX_TEMPERATURE
        )));
    }
    Ok(())
}

/// First [`PREVIEW_CHARS`] characters of `text`, with "..." appended when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
