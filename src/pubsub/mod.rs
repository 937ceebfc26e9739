//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессный хаб для рассылки сообщений по топикам:
//!
//! - `simple`: простой хаб, передаёт данные подписчикам без изменений.
//! - `structured`: хаб поверх канонического словаря с аннотациями и
//!   типизированными обработчиками.
//! - `pattern`: шаблоны топиков (точное имя, glob, regex, предикат).
//! - `canonical`: приведение данных к каноническому словарю и обратно.
//! - `shape`: проверка типа данных обработчика при подписке.
//! - `completer` (приватный): дескриптор завершения публикации.
//! - `worker` (приватный): очередь и задача исполнения подписчика.

pub mod canonical;
mod completer;
pub mod pattern;
pub mod shape;
pub mod simple;
pub mod structured;
mod worker;

pub use canonical::{from_canonical, merge_annotations, to_canonical, CanonicalMap};
pub use completer::Completer;
pub use pattern::{MatchFn, Pattern, TopicMatcher};
pub use shape::{data_shape, validate_handler_data, DataShape};
pub use simple::{Handler, SimpleHub, SimpleHubBuilder, Unsubscriber};
pub use structured::{PostProcess, StructuredHub, StructuredHubBuilder};
