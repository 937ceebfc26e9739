use std::io::{self, Stdout};

/// Для возврата используем trait-объект: Box<dyn
/// tracing_subscriber::layer::Layer<S> + Send + Sync>
use tracing_subscriber::layer::Layer as LayerTrait;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    registry::LookupSpan,
};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Build formatter на основе конфигурации, вывод в stdout.
pub fn build_formatter_from_config<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    // Явно указываем writer как fn() -> Stdout
    let writer: fn() -> Stdout = io::stdout;
    build_formatter_with_writer(config, writer)
}

/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter_with_writer<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match config.format {
        LogFormat::Json => {
            let json_fmt = fmt::format().json().with_current_span(true);
            let layer = fmt::layer()
                .event_format(json_fmt)
                .fmt_fields(fmt::format::JsonFields::new())
                .with_writer(writer)
                .with_ansi(false)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids);
            Box::new(layer)
        }
        LogFormat::Pretty => {
            let pretty_fmt = fmt::format().pretty();
            let layer = fmt::layer()
                .event_format(pretty_fmt)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_names(config.with_thread_ids)
                .with_thread_ids(config.with_thread_ids);
            Box::new(layer)
        }
        LogFormat::Compact => {
            let compact_fmt = fmt::format().compact();
            let layer = fmt::layer()
                .event_format(compact_fmt)
                .with_writer(writer)
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids);
            Box::new(layer)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    #[derive(Clone)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(format: LogFormat) -> String {
        let buffer = Buffer(Arc::new(Mutex::new(Vec::new())));
        let cfg = LoggingConfig {
            format,
            with_ansi: false,
            ..Default::default()
        };
        let sink = buffer.clone();
        let layer = build_formatter_with_writer::<Registry, _>(&cfg, move || sink.clone());
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("pubsub.simple");
            let _enter = span.enter();
            tracing::info!(topic = "orders.created", matched = 2, "published");
        });

        let out = buffer.0.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Тест проверят, что JSON-формат пишет поля события и текущий span.
    #[test]
    fn test_json_format() {
        let out = render(LogFormat::Json);
        let line = out.lines().next().expect("no output");
        let value: serde_json::Value = serde_json::from_str(line).unwrap();

        assert_eq!(value["fields"]["topic"], "orders.created");
        assert_eq!(value["fields"]["message"], "published");
        assert_eq!(value["span"]["name"], "pubsub.simple");
    }

    /// Тест проверят, что события хаба внутри его span пишутся в JSON без
    /// паники при подписке и публикации.
    #[tokio::test]
    async fn test_json_format_with_hub_events() {
        let buffer = Buffer(Arc::new(Mutex::new(Vec::new())));
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            ..Default::default()
        };
        let sink = buffer.clone();
        let layer = build_formatter_with_writer::<Registry, _>(&cfg, move || sink.clone());
        let subscriber = Registry::default()
            .with(layer)
            .with(tracing_subscriber::EnvFilter::new("trace"));
        let _guard = tracing::subscriber::set_default(subscriber);

        let hub = crate::SimpleHub::<i32>::builder()
            .span(tracing::debug_span!("pubsub.simple", hub = "orders"))
            .build();
        hub.subscribe("t", |_, _| {}).unwrap();
        let done = hub.publish("t", 1).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), done.wait())
            .await
            .expect("timed out");

        let out = buffer.0.lock().unwrap();
        let text = String::from_utf8_lossy(&out);
        let subscribed = text
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .find(|value| value["fields"]["message"] == "subscribed")
            .expect("no subscribe event");
        assert_eq!(subscribed["span"]["name"], "pubsub.simple");
        assert_eq!(subscribed["span"]["hub"], "orders");
    }

    #[test]
    fn test_compact_format() {
        let out = render(LogFormat::Compact);
        assert!(out.contains("published"));
        assert!(out.contains("orders.created"));
    }

    #[test]
    fn test_pretty_format() {
        let out = render(LogFormat::Pretty);
        assert!(out.contains("published"));
    }

    /// Тест проверят, что stdout-вариант строится для всех форматов.
    #[test]
    fn test_stdout_formatter_builds() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let cfg = LoggingConfig {
                format,
                ..Default::default()
            };
            let layer = build_formatter_from_config::<Registry>(&cfg);
            let _subscriber = Registry::default().with(layer);
        }
    }
}
