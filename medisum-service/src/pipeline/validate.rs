use crate::models::ValidationReport;

pub const MIN_CONTENT_CHARS: usize = 10;

/// Content check behind `POST /validate`.
///
/// Placeholder: the only rule is a minimum length. It does not inspect
/// medical terminology or safety.
pub fn validate_content(content: &str) -> ValidationReport {
    let mut issues = Vec::new();

    if content.chars().count() < MIN_CONTENT_CHARS {
        issues.push("Content too short for meaningful analysis".to_string());
    }

    ValidationReport {
        is_valid: issues.is_empty(),
        issues,
    }
}
