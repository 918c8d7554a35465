use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set (checked environment and .env)")]
    MissingApiKey,

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}
