use std::{fmt, sync::Arc};

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::HubError;

/// Пользовательский предикат сопоставления топика.
pub type MatchFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Описание интереса подписчика к топикам.
///
/// Строки (`&str`, `String`) превращаются в glob-шаблон, поэтому
/// `"foo.*"` совпадает с `"foo.bar"`, а `"a"` только с `"a"`.
#[derive(Clone)]
pub enum Pattern {
    /// Точное совпадение строки топика.
    Exact(String),
    /// Glob-шаблон (`*`, `?`, `[...]`, `{a,b}`), см. [`globset::Glob`].
    Glob(String),
    /// Регулярное выражение, привязанное ко всей строке топика.
    Regex(String),
    /// Произвольный предикат. Должен быть чистым и детерминированным.
    Custom(MatchFn),
}

/// Скомпилированный шаблон, который хранится в подписке.
#[derive(Clone)]
pub struct TopicMatcher {
    source: String,
    kind: MatcherKind,
}

#[derive(Clone)]
enum MatcherKind {
    Exact(String),
    Glob(GlobMatcher),
    Regex(Regex),
    Custom(MatchFn),
}

impl Pattern {
    pub fn exact(topic: impl Into<String>) -> Self {
        Self::Exact(topic.into())
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    pub fn custom<F>(matcher: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(matcher))
    }

    /// Компилирует шаблон.
    ///
    /// Некорректный glob или regex даёт [`HubError::InvalidPattern`].
    pub fn compile(&self) -> Result<TopicMatcher, HubError> {
        let kind = match self {
            Self::Exact(topic) => MatcherKind::Exact(topic.clone()),
            Self::Glob(pattern) => MatcherKind::Glob(Glob::new(pattern)?.compile_matcher()),
            Self::Regex(pattern) => {
                let anchored = format!("^(?:{pattern})$");
                let re = Regex::new(&anchored).map_err(|err| HubError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: err.to_string(),
                })?;
                MatcherKind::Regex(re)
            }
            Self::Custom(matcher) => MatcherKind::Custom(Arc::clone(matcher)),
        };
        Ok(TopicMatcher {
            source: self.to_string(),
            kind,
        })
    }
}

impl TopicMatcher {
    /// Проверяет, принимает ли шаблон данный топик.
    #[inline]
    pub fn is_match(
        &self,
        topic: &str,
    ) -> bool {
        match &self.kind {
            MatcherKind::Exact(expected) => expected == topic,
            MatcherKind::Glob(glob) => glob.is_match(topic),
            MatcherKind::Regex(re) => re.is_match(topic),
            MatcherKind::Custom(matcher) => matcher(topic),
        }
    }

    /// Исходный текст шаблона.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Exact(topic) => f.write_str(topic),
            Self::Glob(pattern) | Self::Regex(pattern) => f.write_str(pattern),
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Exact(topic) => f.debug_tuple("Exact").field(topic).finish(),
            Self::Glob(pattern) => f.debug_tuple("Glob").field(pattern).finish(),
            Self::Regex(pattern) => f.debug_tuple("Regex").field(pattern).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Debug for TopicMatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TopicMatcher")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl From<&str> for Pattern {
    fn from(pattern: &str) -> Self {
        Self::Glob(pattern.to_string())
    }
}

impl From<String> for Pattern {
    fn from(pattern: String) -> Self {
        Self::Glob(pattern)
    }
}

impl From<&String> for Pattern {
    fn from(pattern: &String) -> Self {
        Self::Glob(pattern.clone())
    }
}
