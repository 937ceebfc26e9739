use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::LoggingError;

/// Формат вывода логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный вывод для разработки.
    Pretty,
    /// Одна строка на событие.
    #[default]
    Compact,
    /// JSON, одна запись на строку.
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень (`info`) или полная директива фильтра
    /// (`warn,pubhub=debug`).
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
}

impl LoggingConfig {
    /// Директива для `EnvFilter`.
    pub fn build_filter_directive(&self) -> String {
        self.level.trim().to_string()
    }

    /// Проверяет уровень и директиву фильтра.
    pub fn validate(&self) -> Result<(), LoggingError> {
        let directive = self.build_filter_directive();
        if directive.is_empty() {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }

        // Голый уровень проверяем строго, иначе EnvFilter примет его как
        // имя target.
        if !directive.contains(['=', ',']) {
            if directive.eq_ignore_ascii_case("off") || Level::from_str(&directive).is_ok() {
                return Ok(());
            }
            return Err(LoggingError::InvalidLevel(directive));
        }

        EnvFilter::try_new(&directive)
            .map(|_| ())
            .map_err(|e| LoggingError::InvalidDirective {
                directive,
                reason: e.to_string(),
            })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
        }
    }
}
