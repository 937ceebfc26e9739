pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use formatter::{build_formatter_from_config, build_formatter_with_writer};
use tracing_subscriber::{layer::SubscriberExt, registry::Registry, util::SubscriberInitExt};

use crate::LoggingError;

/// Инициализация глобального логирования с конфигурацией.
///
/// Повторный вызов возвращает [`LoggingError::AlreadyInitialized`].
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let fmt_layer = formatter::build_formatter_from_config::<Registry>(&config);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверят, что некорректный уровень отклоняется до установки
    /// глобального subscriber.
    #[test]
    fn test_init_logging_rejects_invalid_level() {
        let cfg = LoggingConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_logging(cfg),
            Err(LoggingError::InvalidLevel(_))
        ));
    }
}
