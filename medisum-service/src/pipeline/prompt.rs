use crate::models::Perspective;

/// Prompt for the question/answer form. Plain concatenation, no escaping.
pub fn build_prompt(question: &str, answer: &str, perspective: Perspective) -> String {
    format!("Summarize for {}: {} {}", perspective, question, answer)
}

/// Prompt for a document extracted from a PDF.
pub fn build_document_prompt(text: &str, perspective: Perspective) -> String {
    match perspective {
        Perspective::Patient => format!(
            "Summarize this medical information for a patient in simple, clear language: {}",
            text
        ),
        Perspective::Clinician => format!(
            "Summarize this medical information for a clinician with technical detail: {}",
            text
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_prompt_is_literal_concatenation() {
        assert_eq!(
            build_prompt("What causes fever?", "Infection.", Perspective::Patient),
            "Summarize for patient: What causes fever? Infection."
        );
        assert_eq!(
            build_prompt("Q", "A", Perspective::Clinician),
            "Summarize for clinician: Q A"
        );
    }

    #[test]
    fn qa_prompt_keeps_empty_fields() {
        assert_eq!(build_prompt("", "", Perspective::Patient), "Summarize for patient:  ");
    }

    #[test]
    fn document_prompt_depends_on_perspective() {
        assert_eq!(
            build_document_prompt("ECG normal.", Perspective::Patient),
            "Summarize this medical information for a patient in simple, clear language: ECG normal."
        );
        assert_eq!(
            build_document_prompt("ECG normal.", Perspective::Clinician),
            "Summarize this medical information for a clinician with technical detail: ECG normal."
        );
    }
}
