use anyhow::{Context as _, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use medisum_service::model::{ModelSlot, load_model};
use medisum_service::pipeline::summary::preview;
use medisum_service::pipeline::{Extraction, SummaryPipeline, extract_text};
use medisum_service::{DEFAULT_MAX_LENGTH, DocumentUploadRequest, ServiceConfig};
use std::path::PathBuf;

/// Runs the PDF summary pipeline on a local file, without the HTTP server.
#[derive(Parser, Debug)]
#[command(name = "summarize_pdf")]
struct Args {
    /// PDF file to summarize
    pdf: PathBuf,

    /// Audience of the summary: patient or clinician
    #[arg(short, long, default_value = "patient")]
    perspective: String,

    /// Maximum summary length in tokens
    #[arg(short, long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    /// Only extract text, skip the model
    #[arg(long)]
    extract_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();

    println!("Medical Document PDF -> Text -> Summary");
    println!("=======================================");
    println!("Processing PDF: {}", args.pdf.display());

    let bytes = tokio::fs::read(&args.pdf)
        .await
        .with_context(|| format!("Failed to read {}", args.pdf.display()))?;
    let pdf_content = STANDARD.encode(&bytes);

    if args.extract_only {
        let extraction = extract_text(&pdf_content);
        match &extraction {
            Extraction::Extracted(text) => {
                println!("Extracted {} characters", text.chars().count())
            }
            Extraction::FellBack(reason) => {
                println!("Extraction fell back to the sample report: {}", reason)
            }
        }
        print_preview(&preview(extraction.text()));
        return Ok(());
    }

    let config = ServiceConfig::from_env();
    let model = ModelSlot::new();
    if !model.initialize(|| load_model(&config)).await {
        return Err(anyhow!(
            "No model available; checked: {:?}",
            config.model_paths
        ));
    }

    let pipeline = SummaryPipeline::new(model);
    let request = DocumentUploadRequest {
        pdf_content,
        perspective: args.perspective,
        max_length: args.max_length,
    };
    let result = pipeline.generate_from_document(&request).await?;

    println!("Document text: {} characters", result.text_length);
    print_preview(&result.extracted_text);

    println!("Medical Summary ({}):", result.perspective);
    println!("──────────────────");
    println!("{}", result.summary);
    println!();
    println!("Processing time: {:.2}s", result.processing_time);

    Ok(())
}

fn print_preview(shown: &str) {
    println!();
    println!("Extracted Text (first 500 chars):");
    println!("────────────────────────────────────");
    println!("{}", shown);
    println!();
}
