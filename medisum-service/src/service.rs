use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    error::SummaryError,
    model::{ModelSlot, load_model},
    models::{
        DocumentSummaryResult, DocumentUploadRequest, GenerationRequest, GenerationResult,
        ModelInfoResponse, RootResponse, StatusResponse, ValidateRequest, ValidationReport,
    },
    pipeline::{SummaryPipeline, validate_content},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

// Placeholder figures reported by /status; nothing measures them.
const REPORTED_ACCURACY: f64 = 94.2;
const REPORTED_LOAD: f64 = 52.0;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

/// Maps a pipeline failure to its HTTP response. `action` prefixes
/// generation failures, e.g. "Generation failed".
fn pipeline_error(err: SummaryError, action: &str) -> ApiError {
    match err {
        SummaryError::NotLoaded => {
            warn!("Rejecting request: model not loaded");
            internal_error("Model not loaded")
        }
        SummaryError::InvalidInput(message) => bad_request_error(&message),
        SummaryError::GenerationFailure(message) => {
            error!("{}: {}", action, message);
            internal_error(&format!("{}: {}", action, message))
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SummaryPipeline,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(model: ModelSlot, config: ServiceConfig) -> Self {
        Self {
            pipeline: SummaryPipeline::new(model),
            config: Arc::new(config),
        }
    }

    fn model(&self) -> &ModelSlot {
        self.pipeline.model()
    }

    fn model_path_label(&self) -> String {
        self.model()
            .model_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "Not found".to_string())
    }
}

pub async fn create_app(config: ServiceConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: ServiceConfig) -> AppState {
    let model = ModelSlot::new();
    let loaded = model.initialize(|| load_model(&config)).await;

    if !loaded {
        warn!("WARNING: Model not loaded!");
        warn!("   The API will start but summary generation will fail.");
        warn!("   Place a pre-trained model in one of the model directories and restart.");
    }

    AppState::new(model, config)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/generate", post(generate_summary))
        .route("/upload-pdf", post(upload_pdf))
        .route("/validate", post(validate))
        .route("/status", get(status))
        .route("/model-info", get(model_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Medical LLM API is running".to_string(),
        model_loaded: state.model().is_loaded(),
        model_path: state.model_path_label(),
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn generate_summary(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> ApiResult<GenerationResult> {
    info!(
        "Summary requested for perspective: {}",
        request.perspective
    );

    state
        .pipeline
        .generate(&request)
        .await
        .map(Json)
        .map_err(|e| pipeline_error(e, "Generation failed"))
}

async fn upload_pdf(
    State(state): State<AppState>,
    Json(request): Json<DocumentUploadRequest>,
) -> ApiResult<DocumentSummaryResult> {
    info!(
        "PDF summary requested ({} bytes of base64) for perspective: {}",
        request.pdf_content.len(),
        request.perspective
    );

    state
        .pipeline
        .generate_from_document(&request)
        .await
        .map(Json)
        .map_err(|e| pipeline_error(e, "PDF processing failed"))
}

async fn validate(Json(request): Json<ValidateRequest>) -> Json<ValidationReport> {
    Json(validate_content(&request.content))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let loaded = state.model().is_loaded();
    let status = if loaded { "online" } else { "offline" };
    Json(StatusResponse {
        status: status.to_string(),
        accuracy: REPORTED_ACCURACY,
        load: REPORTED_LOAD,
        model_name: state.config.model_name.clone(),
        model_loaded: loaded,
    })
}

async fn model_info(State(state): State<AppState>) -> ApiResult<ModelInfoResponse> {
    let model = state
        .model()
        .get()
        .ok_or_else(|| pipeline_error(SummaryError::NotLoaded, "Model info failed"))?;
    let description = model.generator.describe();

    Ok(Json(ModelInfoResponse {
        model_type: description.model_type,
        parameters: description.parameters,
        device: description.device,
        model_path: model.path.display().to_string(),
    }))
}
