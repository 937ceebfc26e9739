pub mod hub;
pub mod logging;

pub use hub::{HubError, HubResult};
pub use logging::LoggingError;
