use std::path::Path;

use serde::{Deserialize, Serialize};

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};

use crate::{logging::LoggingConfig, pubsub::CanonicalMap};

/// Имя необязательного файла конфигурации в текущем каталоге
/// (`pubhub.toml`, `pubhub.json`, `pubhub.yaml`, ...).
pub const DEFAULT_CONFIG_NAME: &str = "pubhub";

/// Настройки хаба.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Имя хаба, попадает в span его событий.
    pub name: String,
    /// Аннотации по умолчанию структурированного хаба.
    pub annotations: CanonicalMap,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загрузка: значения по умолчанию, затем необязательный файл
    /// `pubhub.*`, затем переменные окружения `PUBHUB_*`.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Self::defaults()?
            .add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false))
            // Переменные окружения с префиксом PUBHUB_, вложенность через `__`
            .add_source(Self::environment())
            .build()?;

        cfg.try_deserialize()
    }

    /// То же, что [`Settings::load`], но с явным (обязательным) файлом.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let cfg = Self::defaults()?
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(Self::environment())
            .build()?;

        cfg.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let logging = LoggingConfig::default();
        Config::builder()
            .set_default("name", "pubhub")?
            .set_default("logging.level", logging.level)?
            .set_default("logging.with_ansi", logging.with_ansi)?
            .set_default("logging.with_target", logging.with_target)?
            .set_default("logging.with_thread_ids", logging.with_thread_ids)
    }

    fn environment() -> Environment {
        Environment::with_prefix("PUBHUB")
            .prefix_separator("_")
            .separator("__")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "pubhub".to_string(),
            annotations: CanonicalMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use serde_json::json;
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;
    use crate::logging::LogFormat;

    fn clear_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PUBHUB_") {
                env::remove_var(key);
            }
        }
    }

    /// Тест проверяет значения по умолчанию без файла и окружения.
    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::load().unwrap();
        assert_eq!(settings, Settings::default());
    }

    /// Тест проверяет чтение явного TOML-файла.
    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.toml");
        fs::write(
            &path,
            r#"
name = "orders"

[annotations]
app = "shop"
replicas = 3

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.name, "orders");
        assert_eq!(settings.annotations["app"], json!("shop"));
        assert_eq!(settings.annotations["replicas"], json!(3));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert!(settings.logging.with_ansi);
    }

    /// Тест проверяет, что переменные окружения перекрывают файл.
    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hub.toml");
        fs::write(&path, "name = \"from-file\"\n").unwrap();

        env::set_var("PUBHUB_NAME", "from-env");
        env::set_var("PUBHUB_ANNOTATIONS__REGION", "eu");
        env::set_var("PUBHUB_LOGGING__LEVEL", "warn");
        let settings = Settings::load_from(&path);
        clear_env();

        let settings = settings.unwrap();
        assert_eq!(settings.name, "from-env");
        assert_eq!(settings.annotations["region"], json!("eu"));
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        assert!(Settings::load_from(dir.path().join("absent.toml")).is_err());
    }
}
