/// Hub configuration loading (defaults, file, `PUBHUB_*` environment).
pub mod config;
/// Error types: hub operations and logging setup.
pub mod error;
/// Logging setup (filters, output formats).
pub mod logging;
/// Pub/Sub: SimpleHub, StructuredHub, topic patterns, completion handles.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use self::config::Settings;
/// Operation errors and result types.
pub use error::{HubError, HubResult, LoggingError};
/// Logging configuration and initialization.
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    CanonicalMap, Completer, DataShape, Pattern, SimpleHub, StructuredHub, TopicMatcher,
    Unsubscriber,
};
