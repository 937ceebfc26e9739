use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn, Span};

use super::{
    canonical::{self, CanonicalMap},
    shape, Completer, Pattern, SimpleHub, Unsubscriber,
};
use crate::{config::Settings, HubError};

/// Постобработка канонического сообщения перед рассылкой.
pub type PostProcess = Arc<dyn Fn(CanonicalMap) -> Result<CanonicalMap, HubError> + Send + Sync>;

/// Структурированный хаб.
///
/// Прогоняет данные публикации через промежуточное представление (JSON):
/// любая сериализуемая структура превращается в каноническое сообщение
/// [`CanonicalMap`], в которое добавляются аннотации по умолчанию (только
/// для отсутствующих ключей). Подписчики объявляют тип данных, в который
/// сообщение будет десериализовано перед вызовом обработчика.
#[derive(Clone)]
pub struct StructuredHub {
    hub: SimpleHub<CanonicalMap>,
    annotations: Arc<CanonicalMap>,
    post_process: Option<PostProcess>,
}

/// Построитель [`StructuredHub`].
#[derive(Default)]
pub struct StructuredHubBuilder {
    annotations: CanonicalMap,
    post_process: Option<PostProcess>,
    runtime: Option<Handle>,
    span: Option<Span>,
}

impl StructuredHub {
    /// Создаёт хаб с заданными аннотациями по умолчанию.
    pub fn new(annotations: CanonicalMap) -> Self {
        Self::builder().annotations(annotations).build()
    }

    pub fn builder() -> StructuredHubBuilder {
        StructuredHubBuilder::default()
    }

    /// Создаёт хаб из загруженной конфигурации.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::builder()
            .annotations(settings.annotations.clone())
            .span(tracing::debug_span!("pubsub.structured", hub = %settings.name))
            .build()
    }

    /// Публикация произвольных сериализуемых данных.
    ///
    /// Ошибка приведения к каноническому виду прерывает публикацию целиком:
    /// ни один подписчик ничего не получит.
    pub fn publish<D>(
        &self,
        topic: &str,
        data: &D,
    ) -> Result<Completer, HubError>
    where
        D: Serialize + ?Sized,
    {
        let message = canonical::to_canonical(data).inspect_err(|err| {
            warn!(parent: self.hub.span(), topic, error = %err, "cannot marshal publish data");
        })?;
        self.publish_map(topic, message)
    }

    /// Публикация данных, уже приведённых к каноническому словарю.
    pub fn publish_map(
        &self,
        topic: &str,
        mut message: CanonicalMap,
    ) -> Result<Completer, HubError> {
        canonical::merge_annotations(&mut message, &self.annotations);
        if let Some(post_process) = &self.post_process {
            message = post_process(message)?;
        }
        self.hub.publish(topic, message)
    }

    /// Подписка с обработчиком `(topic, data, error)`.
    ///
    /// `T` должен быть записью (структурой) или словарём, иначе
    /// возвращается [`HubError::InvalidHandler`] и подписка не создаётся.
    /// Если сообщение не удалось преобразовать в `T`, обработчик всё равно
    /// вызывается один раз: с `T::default()` и ошибкой
    /// [`HubError::Unmarshal`].
    pub fn subscribe<T, P, F>(
        &self,
        pattern: P,
        handler: F,
    ) -> Result<Unsubscriber, HubError>
    where
        T: DeserializeOwned + Default + Send + 'static,
        P: Into<Pattern>,
        F: Fn(&str, T, Option<HubError>) + Send + Sync + 'static,
    {
        let shape = shape::validate_handler_data::<T>().inspect_err(|err| {
            warn!(parent: self.hub.span(), error = %err, "handler rejected");
        })?;
        debug!(
            parent: self.hub.span(),
            data_type = std::any::type_name::<T>(),
            ?shape,
            "registering structured handler"
        );

        self.hub
            .subscribe(pattern, move |topic: &str, message: &CanonicalMap| {
                match canonical::from_canonical::<T>(message) {
                    Ok(data) => handler(topic, data, None),
                    Err(err) => handler(topic, T::default(), Some(err)),
                }
            })
    }

    /// См. [`SimpleHub::close`].
    pub fn close(&self) -> Completer {
        self.hub.close()
    }

    pub fn is_closed(&self) -> bool {
        self.hub.is_closed()
    }

    /// Количество активных подписок.
    pub fn len(&self) -> usize {
        self.hub.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hub.is_empty()
    }

    /// Аннотации по умолчанию.
    pub fn annotations(&self) -> &CanonicalMap {
        &self.annotations
    }
}

impl StructuredHubBuilder {
    /// Заменяет набор аннотаций по умолчанию.
    pub fn annotations(
        mut self,
        annotations: CanonicalMap,
    ) -> Self {
        self.annotations = annotations;
        self
    }

    /// Добавляет одну аннотацию по умолчанию.
    pub fn annotation(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Постобработка сообщения после добавления аннотаций. Ошибка
    /// прерывает публикацию.
    pub fn post_process<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(CanonicalMap) -> Result<CanonicalMap, HubError> + Send + Sync + 'static,
    {
        self.post_process = Some(Arc::new(f));
        self
    }

    pub fn runtime(
        mut self,
        handle: Handle,
    ) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn span(
        mut self,
        span: Span,
    ) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> StructuredHub {
        let span = self
            .span
            .unwrap_or_else(|| tracing::debug_span!("pubsub.structured"));
        let mut builder = SimpleHub::builder().span(span);
        if let Some(handle) = self.runtime {
            builder = builder.runtime(handle);
        }
        StructuredHub {
            hub: builder.build(),
            annotations: Arc::new(self.annotations),
            post_process: self.post_process,
        }
    }
}

impl fmt::Debug for StructuredHub {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StructuredHub")
            .field("hub", &self.hub)
            .field("annotations", &self.annotations)
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}
