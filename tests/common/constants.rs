//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (user credentials, stub catalog content, etc.),
//! update only this file.

#![allow(dead_code)]

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

// ============================================================================
// Anonymous sessions
// ============================================================================

/// Client-generated session id of an anonymous viewer
pub const SESSION_A: &str = "session-a-0f1e2d3c";

/// Another anonymous viewer, never sees SESSION_A's data
pub const SESSION_B: &str = "session-b-4b5a6978";

// ============================================================================
// Stub catalog content
// ============================================================================

/// Tracks returned by every genre chart of the stub catalog
pub const STUB_CHART_SIZE: usize = 2;

/// Tracks returned by every related-tracks call of the stub catalog
pub const STUB_RELATED_SIZE: usize = 3;

/// Genres sampled per feed with the default settings
pub const GENRES_PER_ROUND: usize = 3;

/// Feed size when no expansion pool is fetched
pub const CHART_ONLY_FEED_SIZE: usize = GENRES_PER_ROUND * STUB_CHART_SIZE;

/// Pop, part of the default taxonomy
pub const POP_GENRE_ID: u32 = 132;

/// Rock, part of the default taxonomy
pub const ROCK_GENRE_ID: u32 = 152;

/// Item ids of chart tracks are `genre_id * 100 + n`
pub fn chart_item_id(genre_id: u32, n: i64) -> i64 {
    genre_id as i64 * 100 + n
}

/// Item ids of related tracks are `item_id * 10 + n`
pub fn related_item_id(item_id: i64, n: i64) -> i64 {
    item_id * 10 + n
}

// ============================================================================
// Timeouts
// ============================================================================

/// Max time to wait for the server to answer its first request
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout of every request issued by TestClient
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
