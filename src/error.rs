use thiserror::Error;

#[derive(Error, Debug)]
pub enum RubigeneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lookup table error: {0}")]
    LookupTable(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Malformed ruby markup: {0}")]
    Markup(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl RubigeneError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RubigeneError>;
