use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SummaryError;

pub const DEFAULT_MAX_TOKENS: usize = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_LENGTH: usize = 150;

/// Target audience of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    Patient,
    Clinician,
}

impl Perspective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Patient => "patient",
            Perspective::Clinician => "clinician",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Perspective {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Perspective::Patient),
            "clinician" => Ok(Perspective::Clinician),
            _ => Err(SummaryError::InvalidInput(
                "Perspective must be 'patient' or 'clinician'".to_string(),
            )),
        }
    }
}

fn default_perspective() -> String {
    Perspective::Patient.as_str().to_string()
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

/// Body of `POST /generate`.
///
/// `perspective` stays a string here so an unknown value is reported as a
/// client error by the pipeline instead of a deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default = "default_perspective")]
    pub perspective: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

/// Body of `POST /upload-pdf`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUploadRequest {
    /// Base64 encoded PDF bytes.
    #[serde(default)]
    pub pdf_content: String,
    #[serde(default = "default_perspective")]
    pub perspective: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    pub summary: String,
    pub confidence: f64,
    pub processing_time: f64,
    pub safety_score: f64,
    pub perspective: Perspective,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummaryResult {
    pub summary: String,
    /// At most 500 characters of the extracted text, plus "..." when cut.
    pub extracted_text: String,
    pub confidence: f64,
    pub processing_time: f64,
    pub safety_score: f64,
    pub perspective: Perspective,
    /// Length of the base64 payload as received.
    pub file_size: usize,
    pub text_length: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub model_loaded: bool,
    pub model_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub accuracy: f64,
    pub load: f64,
    pub model_name: String,
    pub model_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub parameters: u64,
    pub device: String,
    pub model_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_parses_known_values_only() {
        assert_eq!("patient".parse::<Perspective>().unwrap(), Perspective::Patient);
        assert_eq!(
            "clinician".parse::<Perspective>().unwrap(),
            Perspective::Clinician
        );
        assert!("Patient".parse::<Perspective>().is_err());
        assert!("nurse".parse::<Perspective>().is_err());
        assert!("".parse::<Perspective>().is_err());
    }

    #[test]
    fn generation_request_fills_defaults() {
        let request: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.question, "");
        assert_eq!(request.answer, "");
        assert_eq!(request.perspective, "patient");
        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.temperature, 0.7);
    }

    #[test]
    fn upload_request_fills_defaults() {
        let request: DocumentUploadRequest =
            serde_json::from_str(r#"{"pdf_content": "JVBERi0="}"#).unwrap();
        assert_eq!(request.perspective, "patient");
        assert_eq!(request.max_length, 150);
    }

    #[test]
    fn perspective_serializes_lowercase() {
        let value = serde_json::to_value(Perspective::Clinician).unwrap();
        assert_eq!(value, serde_json::json!("clinician"));
    }
}
