use std::{
    any::Any,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{runtime::Handle, sync::mpsc};
use tracing::{error, trace, Instrument, Span};

/// Замыкание уведомления одного подписчика.
pub(crate) type Notification = Box<dyn FnOnce() + Send + 'static>;

/// Контекст исполнения подписчика.
///
/// Каждый подписчик получает собственную задачу tokio и очередь, поэтому
/// уведомления одного подписчика выполняются строго по порядку (FIFO), а
/// разные подписчики работают параллельно. Обработчики синхронные и
/// запускаются через `spawn_blocking`, паника перехватывается и
/// логируется.
pub(crate) struct Worker {
    tx: mpsc::UnboundedSender<Notification>,
    stopped: Arc<AtomicBool>,
}

impl Worker {
    pub(crate) fn spawn(
        subscriber_id: u64,
        runtime: &Handle,
        span: Span,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);

        runtime.spawn(
            async move {
                while let Some(job) = rx.recv().await {
                    if flag.load(Ordering::Acquire) {
                        // Подписчик закрыт: токен завершения освобождается
                        // вместе с замыканием.
                        drop(job);
                        continue;
                    }
                    if let Err(err) = tokio::task::spawn_blocking(job).await {
                        if err.is_panic() {
                            let reason = panic_message(err.into_panic());
                            error!(subscriber_id, %reason, "subscriber handler panicked");
                        } else {
                            error!(subscriber_id, "subscriber handler was cancelled");
                        }
                    }
                }
                trace!(subscriber_id, "subscriber worker stopped");
            }
            .instrument(span),
        );

        Self { tx, stopped }
    }

    /// Ставит уведомление в очередь подписчика. Не блокирует.
    ///
    /// Возвращает `false`, если задача подписчика уже не существует
    /// (например, runtime остановлен): уведомление отброшено вместе с его
    /// токеном завершения.
    #[must_use]
    pub(crate) fn notify(
        &self,
        job: Notification,
    ) -> bool {
        self.tx.send(job).is_ok()
    }

    /// Закрывает подписчика: ещё не выполненные уведомления отбрасываются.
    pub(crate) fn close(self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Выводит подписчика из работы: очередь дорабатывается до конца.
    pub(crate) fn retire(self) {}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use tokio::time::timeout;

    use super::*;
    use crate::pubsub::completer::DoneToken;

    fn worker() -> Worker {
        Worker::spawn(1, &Handle::current(), Span::none())
    }

    /// Тест проверяет, что уведомления одного подписчика выполняются
    /// в порядке постановки в очередь.
    #[tokio::test]
    async fn test_fifo_order() {
        let worker = worker();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (token, completer) = DoneToken::new();

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            let t = token.clone();
            assert!(worker.notify(Box::new(move || {
                let _t = t;
                seen.lock().unwrap().push(i);
            })));
        }
        drop(token);

        timeout(Duration::from_secs(1), completer.wait())
            .await
            .expect("timed out");
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    /// Тест проверяет, что паника обработчика не останавливает очередь
    /// и освобождает токен завершения.
    #[tokio::test]
    async fn test_panic_does_not_stop_queue() {
        let worker = worker();
        let calls = Arc::new(AtomicUsize::new(0));
        let (token, completer) = DoneToken::new();

        let t = token.clone();
        assert!(worker.notify(Box::new(move || {
            let _t = t;
            panic!("boom");
        })));
        let c = Arc::clone(&calls);
        let t = token.clone();
        assert!(worker.notify(Box::new(move || {
            let _t = t;
            c.fetch_add(1, Ordering::SeqCst);
        })));
        drop(token);

        timeout(Duration::from_secs(1), completer.wait())
            .await
            .expect("timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Тест проверяет, что после `close` очередь не исполняется, но токены
    /// всё равно освобождаются.
    #[tokio::test]
    async fn test_close_drops_pending() {
        let worker = worker();
        let calls = Arc::new(AtomicUsize::new(0));
        let (token, completer) = DoneToken::new();

        // Первое уведомление держит очередь, пока мы не закроем подписчика.
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let t = token.clone();
        assert!(worker.notify(Box::new(move || {
            let _t = t;
            let _ = release_rx.recv_timeout(Duration::from_secs(1));
        })));
        for _ in 0..5 {
            let c = Arc::clone(&calls);
            let t = token.clone();
            assert!(worker.notify(Box::new(move || {
                let _t = t;
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }
        drop(token);

        worker.close();
        // Если первое уведомление тоже было отброшено, получателя уже нет.
        let _ = release_tx.send(());

        timeout(Duration::from_secs(2), completer.wait())
            .await
            .expect("timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Тест проверяет, что `retire` дорабатывает уже поставленные
    /// уведомления.
    #[tokio::test]
    async fn test_retire_drains_queue() {
        let worker = worker();
        let calls = Arc::new(AtomicUsize::new(0));
        let (token, completer) = DoneToken::new();

        for _ in 0..5 {
            let c = Arc::clone(&calls);
            let t = token.clone();
            assert!(worker.notify(Box::new(move || {
                let _t = t;
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }
        drop(token);
        worker.retire();

        timeout(Duration::from_secs(1), completer.wait())
            .await
            .expect("timed out");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    /// Тест проверяет, что после остановки runtime уведомление не
    /// принимается и токен завершения освобождается.
    #[test]
    fn test_notify_after_runtime_shutdown() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let worker = Worker::spawn(7, rt.handle(), Span::none());
        drop(rt);

        let (token, completer) = DoneToken::new();
        let t = token.clone();
        assert!(!worker.notify(Box::new(move || {
            let _t = t;
        })));
        drop(token);
        assert!(completer.is_complete());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic payload");
    }
}
