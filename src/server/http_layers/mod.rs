mod no_cache;
#[cfg(feature = "slowdown")]
mod random_slowdown;
mod requests_logging;

pub use no_cache::no_cache;
#[cfg(feature = "slowdown")]
pub use random_slowdown::slowdown_request;
pub use requests_logging::{log_requests, RequestsLoggingLevel};
