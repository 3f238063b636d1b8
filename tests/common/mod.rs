//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, SESSION_A};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_discover() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::anonymous(server.base_url.clone(), SESSION_A);
//!
//!     let response = client.get_discover().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
