use thiserror::Error;

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("global subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}
