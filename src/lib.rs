//! SwipeSound Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog_client;
pub mod config;
pub mod discovery;
pub mod interactions;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog_client::{CatalogClient, DeezerCatalogClient};
pub use discovery::{DiscoveryEngine, DiscoveryError};
pub use server::{run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager, UserStore};
