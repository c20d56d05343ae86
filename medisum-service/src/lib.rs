pub mod config;
pub mod error;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ModelError, SummaryError};
pub use models::*;
pub use service::{AppState, build_router, create_app};
