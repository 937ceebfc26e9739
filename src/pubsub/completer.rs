use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::watch;

/// Счётчик незавершённых уведомлений одной публикации.
struct Tracker {
    pending: AtomicUsize,
    done: watch::Sender<bool>,
}

/// Токен незавершённого уведомления.
///
/// Клон увеличивает счётчик, drop уменьшает. Последний drop переводит
/// [`Completer`] в завершённое состояние. Токен освобождается и тогда,
/// когда уведомление так и не было выполнено (отписка, паника).
pub(crate) struct DoneToken {
    tracker: Arc<Tracker>,
}

/// Дескриптор завершения одной публикации.
///
/// Завершается ровно один раз, после того как отработали все уведомления,
/// разосланные этой публикацией. Отмены и таймаута нет: при необходимости
/// оборачивайте [`Completer::wait`] в `tokio::time::timeout`.
#[derive(Clone)]
pub struct Completer {
    tracker: Arc<Tracker>,
    rx: watch::Receiver<bool>,
}

impl DoneToken {
    /// Создаёт первый токен и связанный с ним `Completer`.
    pub(crate) fn new() -> (Self, Completer) {
        let (done, rx) = watch::channel(false);
        let tracker = Arc::new(Tracker {
            pending: AtomicUsize::new(1),
            done,
        });
        let completer = Completer {
            tracker: Arc::clone(&tracker),
            rx,
        };
        (Self { tracker }, completer)
    }
}

impl Clone for DoneToken {
    fn clone(&self) -> Self {
        // Клонируем только из живого токена, счётчик здесь > 0.
        self.tracker.pending.fetch_add(1, Ordering::Relaxed);
        Self {
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl Drop for DoneToken {
    fn drop(&mut self) {
        if self.tracker.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.done.send_replace(true);
        }
    }
}

impl Completer {
    /// Уже завершённый дескриптор.
    pub fn resolved() -> Self {
        let (token, completer) = DoneToken::new();
        drop(token);
        completer
    }

    /// Проверяет без ожидания, завершены ли все уведомления.
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow()
    }

    /// Количество ещё не завершённых уведомлений.
    pub fn pending(&self) -> usize {
        self.tracker.pending.load(Ordering::Acquire)
    }

    /// Ожидает завершения всех уведомлений публикации.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // Отправитель живёт в трекере, который держим мы сами.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl fmt::Debug for Completer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Completer")
            .field("complete", &self.is_complete())
            .field("pending", &self.pending())
            .finish()
    }
}
