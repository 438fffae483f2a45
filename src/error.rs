use thiserror::Error;

/// Errors raised while loading configuration and wiring the service together
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

pub type Result<T> = std::result::Result<T, StartupError>;
