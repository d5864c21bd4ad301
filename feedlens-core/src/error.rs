use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Extension context invalidated: {context}")]
    ContextInvalidated { context: String },
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication expired")]
    SessionExpired,

    #[error("Failed to get auth URL: {reason}")]
    AuthUrlUnavailable { reason: String },

    #[error("No auth_uri in response")]
    MissingAuthUri,

    #[error("Callback payload rejected: {reason}")]
    InvalidCallback { reason: String },

    #[error("Not logged in to X. Please log in at x.com first.")]
    MissingSessionCookies,

    #[error("X account not connected. Please connect in settings.")]
    AccountNotLinked,

    #[error("X API error: {status_code}")]
    ApiStatus { status_code: u16 },

    #[error("Browser tab operation failed: {reason}")]
    TabFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Corrupt value stored under key: {key}")]
    CorruptValue { key: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    #[error("Provider {provider} returned status {status_code}: {body}")]
    HttpStatus {
        provider: String,
        status_code: u16,
        body: String,
    },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },

    #[error("Classification value out of range: {field}={value}")]
    InvalidLabel { field: String, value: String },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
