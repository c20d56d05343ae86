use medisum_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig::from_env();
    let bind_address = config.bind_address();

    info!("Loading medical summarization model...");
    let app = create_app(config).await;

    let listener = TcpListener::bind(&bind_address).await?;
    let addr = listener.local_addr()?;

    info!("Medical LLM API server starting on {}", addr);
    info!("   - POST /generate   - Generate medical summary");
    info!("   - POST /upload-pdf - Process PDF and generate summary");
    info!("   - POST /validate   - Validate medical content");
    info!("   - GET  /status     - Get model status");
    info!("   - GET  /model-info - Get detailed model information");
    info!("   - GET  /           - Health check");

    axum::serve(listener, app).await?;

    Ok(())
}
