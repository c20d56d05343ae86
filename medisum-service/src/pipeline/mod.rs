pub mod extract;
pub mod prompt;
pub mod summary;
pub mod validate;

pub use extract::{Extraction, FallbackReason, extract_text};
pub use prompt::{build_document_prompt, build_prompt};
pub use summary::SummaryPipeline;
pub use validate::validate_content;
