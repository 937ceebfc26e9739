use thiserror::Error;

/// Ошибки хаба публикации/подписки.
///
/// Ошибки регистрации (`InvalidPattern`, `InvalidHandler`) и публикации
/// (`Marshal`, `Closed`) возвращаются вызывающему коду синхронно.
/// `Unmarshal` видит только обработчик, для которого не удалось
/// преобразовать данные.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("invalid topic pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid handler: {0}")]
    InvalidHandler(String),

    #[error("payload marshalling failed: {0}")]
    Marshal(String),

    #[error("payload unmarshalling failed: {0}")]
    Unmarshal(String),

    #[error("hub is closed")]
    Closed,

    #[error("no tokio runtime available for subscriber workers")]
    NoRuntime,
}

pub type HubResult<T> = Result<T, HubError>;

// === Преобразования ===

impl From<globset::Error> for HubError {
    fn from(err: globset::Error) -> Self {
        HubError::InvalidPattern {
            pattern: err.glob().unwrap_or_default().to_string(),
            reason: err.kind().to_string(),
        }
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Marshal(err.to_string())
    }
}
