use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    /// Transport-level failures that a later trigger may succeed on.
    fn is_transient(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "CoreError: {}", self);
        match self {
            CoreError::Auth(e) => {
                error!("Auth error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Llm(e) => {
                error!("LLM error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "CoreError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        match self {
            CoreError::Database(e) => e.is_transient(),
            CoreError::Llm(e) => e.is_transient(),
            CoreError::Network(_) => true,
            CoreError::Auth(e) => e.is_transient(),
            CoreError::ContextInvalidated { .. } => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Auth(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { .. } => {
                "Invalid input provided. Please check your input and try again.".to_string()
            }
            CoreError::ContextInvalidated { .. } => {
                "Extension was reloaded. Please refresh the page.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Auth(_) => "AUTH".to_string(),
            CoreError::Database(_) => "DATABASE".to_string(),
            CoreError::Llm(_) => "LLM".to_string(),
            CoreError::Extraction(_) => "EXTRACTION".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::ContextInvalidated { .. } => "CONTEXT_INVALIDATED".to_string(),
        }
    }
}

impl ErrorExt for AuthError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "AuthError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "AuthError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::AuthUrlUnavailable { .. } | AuthError::ApiStatus { status_code: 500..=599 }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            AuthError::NotAuthenticated => "Not authenticated".to_string(),
            AuthError::SessionExpired => "Authentication expired".to_string(),
            // The raw message is what the login button shows.
            AuthError::AuthUrlUnavailable { .. } | AuthError::MissingAuthUri => self.to_string(),
            AuthError::MissingSessionCookies | AuthError::AccountNotLinked => self.to_string(),
            AuthError::ApiStatus { status_code } => format!("X API error: {}", status_code),
            _ => "Authentication error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            AuthError::NotAuthenticated => "AUTH_NOT_AUTHENTICATED".to_string(),
            AuthError::SessionExpired => "AUTH_SESSION_EXPIRED".to_string(),
            AuthError::AuthUrlUnavailable { .. } => "AUTH_URL_UNAVAILABLE".to_string(),
            AuthError::MissingAuthUri => "AUTH_MISSING_AUTH_URI".to_string(),
            AuthError::InvalidCallback { .. } => "AUTH_INVALID_CALLBACK".to_string(),
            AuthError::MissingSessionCookies => "AUTH_MISSING_COOKIES".to_string(),
            AuthError::AccountNotLinked => "AUTH_ACCOUNT_NOT_LINKED".to_string(),
            AuthError::ApiStatus { .. } => "AUTH_API_STATUS".to_string(),
            AuthError::TabFailed { .. } => "AUTH_TAB_FAILED".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "DatabaseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "DatabaseError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        match self {
            DatabaseError::ConnectionFailed { .. } => true,
            DatabaseError::Sql(e) => matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => {
                "Database connection failed. Please try again.".to_string()
            }
            DatabaseError::CorruptValue { key } => {
                format!("Stored data for '{}' is unreadable and will be reset.", key)
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::CorruptValue { .. } => "DB_CORRUPT_VALUE".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for LlmError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "LlmError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "LlmError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestTimeout { .. } => true,
            LlmError::HttpStatus { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::UnknownProvider { provider } => {
                format!("'{}' is not a supported AI provider.", provider)
            }
            LlmError::HttpStatus {
                provider,
                status_code,
                ..
            } => format!("{} returned HTTP {}.", provider, status_code),
            _ => "AI service error occurred. Falling back to keyword analysis.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            LlmError::UnknownProvider { .. } => "LLM_UNKNOWN_PROVIDER".to_string(),
            LlmError::HttpStatus { .. } => "LLM_HTTP_STATUS".to_string(),
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT".to_string(),
            LlmError::InvalidResponseFormat { .. } => "LLM_INVALID_RESPONSE".to_string(),
            LlmError::InvalidLabel { .. } => "LLM_INVALID_LABEL".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!(code = %self.error_code(), "ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!(code = %self.error_code(), "ConfigError (warning): {}", self);
        self
    }

    fn is_transient(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is invalid: {}", reason)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}
