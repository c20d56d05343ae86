use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_MODEL_PATHS: [&str; 4] = [
    "./my_medical_llm",
    "../my_medical_llm",
    "./models/my_medical_llm",
    "../models/my_medical_llm",
];

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Candidate model directories in search order.
    pub model_paths: Vec<PathBuf>,
    pub model_name: String,
    pub use_cuda: bool,
    pub max_input_tokens: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_paths: DEFAULT_MODEL_PATHS.iter().map(PathBuf::from).collect(),
            model_name: "medical-summarizer".to_string(),
            use_cuda: false,
            max_input_tokens: 512,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let model_paths = lookup("MEDISUM_MODEL_PATHS")
            .map(|raw| parse_path_list(&raw))
            .filter(|paths| !paths.is_empty())
            .unwrap_or(defaults.model_paths);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            model_paths,
            model_name: lookup("MEDISUM_MODEL_NAME").unwrap_or(defaults.model_name),
            use_cuda: parse_or("MEDISUM_USE_CUDA", lookup("MEDISUM_USE_CUDA"), defaults.use_cuda),
            max_input_tokens: parse_or(
                "MEDISUM_MAX_INPUT_TOKENS",
                lookup("MEDISUM_MAX_INPUT_TOKENS"),
                defaults.max_input_tokens,
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, value);
            default
        }),
        None => default,
    }
}
