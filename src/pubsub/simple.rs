use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, Span};

use super::{
    completer::DoneToken,
    worker::{Notification, Worker},
    Completer, Pattern, TopicMatcher,
};
use crate::HubError;

/// Обработчик уведомлений простого хаба.
pub type Handler<T> = Arc<dyn Fn(&str, &T) + Send + Sync>;

/// Простой хаб публикации/подписки.
///
/// Не трогает данные, переданные в [`SimpleHub::publish`]: одно и то же
/// значение (`Arc<T>`) передаётся всем подходящим подписчикам параллельно.
///
/// Поддерживает:
/// - Подписки по точному имени, glob, regex или произвольному предикату
/// - Параллельную рассылку с отдельной FIFO-очередью на подписчика
/// - Дескриптор завершения для каждой публикации
/// - Закрытие хаба с ожиданием уже разосланных уведомлений
pub struct SimpleHub<T> {
    inner: Arc<HubInner<T>>,
}

/// Токен отписки, возвращаемый [`SimpleHub::subscribe`].
///
/// Отписка явная: drop токена подписку не снимает.
#[derive(Clone)]
pub struct Unsubscriber {
    id: u64,
    hub: Weak<dyn Detach>,
}

/// Построитель [`SimpleHub`].
pub struct SimpleHubBuilder<T> {
    runtime: Option<Handle>,
    span: Option<Span>,
    _payload: PhantomData<fn() -> T>,
}

struct HubInner<T> {
    registry: Mutex<Registry<T>>,
    /// Завершается, когда хаб закрыт и все его уведомления отработали.
    lifetime: Completer,
    runtime: Option<Handle>,
    span: Span,
}

struct Registry<T> {
    subscribers: Vec<Subscription<T>>,
    next_id: u64,
    /// `None` после `close()`.
    lifetime_token: Option<DoneToken>,
}

struct Subscription<T> {
    id: u64,
    matcher: TopicMatcher,
    handler: Handler<T>,
    worker: Worker,
}

trait Detach: Send + Sync {
    fn detach(
        &self,
        id: u64,
    );
}

impl<T> SimpleHub<T>
where
    T: Send + Sync + 'static,
{
    /// Создаёт хаб, который берёт runtime tokio из текущего контекста при
    /// подписке.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SimpleHubBuilder<T> {
        SimpleHubBuilder {
            runtime: None,
            span: None,
            _payload: PhantomData,
        }
    }

    /// Подписка на топики, принимаемые шаблоном.
    ///
    /// Шаблон компилируется до любых изменений реестра, поэтому ошибка не
    /// оставляет частичной регистрации.
    pub fn subscribe<P, F>(
        &self,
        pattern: P,
        handler: F,
    ) -> Result<Unsubscriber, HubError>
    where
        P: Into<Pattern>,
        F: Fn(&str, &T) + Send + Sync + 'static,
    {
        let pattern = pattern.into();
        let matcher = pattern.compile()?;
        let runtime = self.runtime()?;

        let mut registry = self.inner.registry.lock();
        if registry.lifetime_token.is_none() {
            return Err(HubError::Closed);
        }
        let id = registry.next_id;
        registry.next_id += 1;
        let worker = Worker::spawn(id, &runtime, self.inner.span.clone());
        registry.subscribers.push(Subscription {
            id,
            matcher,
            handler: Arc::new(handler),
            worker,
        });
        drop(registry);

        debug!(parent: &self.inner.span, subscriber_id = id, %pattern, "subscribed");

        let hub: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Ok(Unsubscriber { id, hub })
    }

    /// Подписка с произвольным предикатом вместо шаблона.
    pub fn subscribe_match<M, F>(
        &self,
        matcher: M,
        handler: F,
    ) -> Result<Unsubscriber, HubError>
    where
        M: Fn(&str) -> bool + Send + Sync + 'static,
        F: Fn(&str, &T) + Send + Sync + 'static,
    {
        self.subscribe(Pattern::custom(matcher), handler)
    }

    /// Публикация данных в топик.
    ///
    /// Работает так:
    /// 1. Под блокировкой реестра выбирает подписчиков, чей шаблон
    ///    принимает `topic`, в порядке регистрации
    /// 2. Ставит каждому замыкание уведомления в его очередь
    /// 3. Сразу возвращает [`Completer`], не дожидаясь обработчиков
    ///
    /// Если подходящих подписчиков нет, `Completer` уже завершён. Подписка,
    /// чья задача больше не существует (runtime остановлен), логируется
    /// и удаляется из реестра; её уведомление не считается доставленным.
    pub fn publish(
        &self,
        topic: &str,
        data: T,
    ) -> Result<Completer, HubError> {
        let mut registry = self.inner.registry.lock();
        let Some(lifetime) = registry.lifetime_token.clone() else {
            return Err(HubError::Closed);
        };

        let (token, completer) = DoneToken::new();
        let topic: Arc<str> = Arc::from(topic);
        let data = Arc::new(data);
        let mut matched = 0usize;
        let mut dead = Vec::new();

        for sub in registry
            .subscribers
            .iter()
            .filter(|sub| sub.matcher.is_match(&topic))
        {
            let handler = Arc::clone(&sub.handler);
            let topic = Arc::clone(&topic);
            let data = Arc::clone(&data);
            let tokens = (token.clone(), lifetime.clone());
            let job: Notification = Box::new(move || {
                let _tokens = tokens;
                handler(&topic, &data);
            });
            if sub.worker.notify(job) {
                matched += 1;
            } else {
                dead.push(sub.id);
            }
        }

        // Задача подписчика исчезла вместе со своим runtime: такая подписка
        // больше ничего не получит, снимаем её.
        if !dead.is_empty() {
            registry.subscribers.retain(|sub| !dead.contains(&sub.id));
            for subscriber_id in &dead {
                error!(
                    parent: &self.inner.span,
                    subscriber_id,
                    topic = %topic,
                    "subscriber worker is gone, notification dropped and subscription removed"
                );
            }
        }
        drop(registry);
        drop(token);

        trace!(parent: &self.inner.span, topic = %topic, matched, dropped = dead.len(), "published");
        Ok(completer)
    }

    /// Закрывает хаб.
    ///
    /// Новые `subscribe` и `publish` получают [`HubError::Closed`].
    /// Уже поставленные в очереди уведомления дорабатывают. Возвращённый
    /// `Completer` завершается, когда отработали все уведомления хаба.
    /// Повторный вызов возвращает тот же дескриптор.
    pub fn close(&self) -> Completer {
        let mut registry = self.inner.registry.lock();
        if let Some(token) = registry.lifetime_token.take() {
            let retired = registry.subscribers.len();
            for sub in registry.subscribers.drain(..) {
                sub.worker.retire();
            }
            drop(token);
            debug!(parent: &self.inner.span, retired, "hub closed");
        }
        self.inner.lifetime.clone()
    }

    /// Проверяет, закрыт ли хаб.
    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().lifetime_token.is_none()
    }

    /// Количество активных подписок.
    pub fn len(&self) -> usize {
        self.inner.registry.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Span, в котором хаб пишет свои события.
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    fn runtime(&self) -> Result<Handle, HubError> {
        match &self.inner.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| HubError::NoRuntime),
        }
    }
}

impl<T> SimpleHubBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Runtime, на котором запускаются очереди подписчиков.
    pub fn runtime(
        mut self,
        handle: Handle,
    ) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Span для событий хаба (вместо глобального логгера).
    pub fn span(
        mut self,
        span: Span,
    ) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> SimpleHub<T> {
        let (lifetime_token, lifetime) = DoneToken::new();
        let span = self
            .span
            .unwrap_or_else(|| tracing::debug_span!("pubsub.simple"));
        SimpleHub {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry {
                    subscribers: Vec::new(),
                    next_id: 0,
                    lifetime_token: Some(lifetime_token),
                }),
                lifetime,
                runtime: self.runtime,
                span,
            }),
        }
    }
}

impl<T> Detach for HubInner<T>
where
    T: Send + Sync + 'static,
{
    fn detach(
        &self,
        id: u64,
    ) {
        let mut registry = self.registry.lock();
        if let Some(pos) = registry.subscribers.iter().position(|sub| sub.id == id) {
            // `remove` сохраняет порядок остальных подписчиков.
            let sub = registry.subscribers.remove(pos);
            sub.worker.close();
            debug!(parent: &self.span, subscriber_id = id, "unsubscribed");
        }
    }
}

impl Unsubscriber {
    /// Снимает подписку. Повторный вызов ничего не делает.
    pub fn unsubscribe(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.detach(self.id);
        }
    }

    /// Идентификатор подписки внутри хаба.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for SimpleHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SimpleHub<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SimpleHub<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("SimpleHub")
            .field("subscribers", &registry.subscribers.len())
            .field("next_id", &registry.next_id)
            .field("closed", &registry.lifetime_token.is_none())
            .finish()
    }
}

impl fmt::Debug for Unsubscriber {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Unsubscriber").field("id", &self.id).finish()
    }
}
