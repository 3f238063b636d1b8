//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all swipesound-server endpoints.
//!
//! When API routes or request formats change, update only this file.

#![allow(dead_code)]

use super::constants::*;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management and an optional
/// anonymous session id sent as `X-Session-Id`.
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Anonymous session id, attached to every request when set
    pub session_id: Option<String>,
}

impl TestClient {
    /// Creates a client with neither an account nor an anonymous session
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            session_id: None,
        }
    }

    /// Creates a client identified by an anonymous session id
    pub fn anonymous(base_url: String, session_id: &str) -> Self {
        let mut client = Self::new(base_url);
        client.session_id = Some(session_id.to_string());
        client
    }

    /// Creates a client logged in as the regular test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(TEST_USER, TEST_PASS).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session_id {
            Some(session_id) => request.header("X-Session-Id", session_id),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Response {
        self.with_session(request)
            .send()
            .await
            .expect("Request failed")
    }

    // ========================================================================
    // Server
    // ========================================================================

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.send(self.client.get(format!("{}/", self.base_url)))
            .await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str, password: &str) -> Response {
        self.send(
            self.client
                .post(format!("{}/v1/auth/register", self.base_url))
                .json(&json!({
                    "user_handle": handle,
                    "password": password,
                })),
        )
        .await
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.send(
            self.client
                .post(format!("{}/v1/auth/login", self.base_url))
                .json(&json!({
                    "user_handle": handle,
                    "password": password,
                })),
        )
        .await
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.send(self.client.get(format!("{}/v1/auth/logout", self.base_url)))
            .await
    }

    /// POST /v1/auth/forgot-password
    pub async fn forgot_password(&self, handle: &str) -> Response {
        self.send(
            self.client
                .post(format!("{}/v1/auth/forgot-password", self.base_url))
                .json(&json!({ "user_handle": handle })),
        )
        .await
    }

    /// Requests a password reset and returns the issued token
    pub async fn request_reset_token(&self, handle: &str) -> String {
        let response = self.forgot_password(handle).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Reset response is not JSON");
        body["debug_token"]
            .as_str()
            .expect("No reset token in response")
            .to_string()
    }

    /// POST /v1/auth/reset-password
    pub async fn reset_password(&self, token: &str, password: &str) -> Response {
        self.send(
            self.client
                .post(format!("{}/v1/auth/reset-password", self.base_url))
                .json(&json!({
                    "token": token,
                    "password": password,
                })),
        )
        .await
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/user/genres
    pub async fn get_user_genres(&self) -> Response {
        self.send(self.client.get(format!("{}/v1/user/genres", self.base_url)))
            .await
    }

    /// PUT /v1/user/genres
    pub async fn put_user_genres(&self, genre_ids: &[u32]) -> Response {
        self.send(
            self.client
                .put(format!("{}/v1/user/genres", self.base_url))
                .json(&json!({ "genre_ids": genre_ids })),
        )
        .await
    }

    // ========================================================================
    // Discovery Endpoints
    // ========================================================================

    /// GET /v1/discover
    pub async fn get_discover(&self) -> Response {
        self.send(self.client.get(format!("{}/v1/discover", self.base_url)))
            .await
    }

    /// GET /v1/discover, parsed into the list of candidates
    pub async fn get_feed(&self) -> Vec<Value> {
        let response = self.get_discover().await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Feed is not JSON")
    }

    /// POST /v1/discover/swipe with a raw JSON body
    pub async fn swipe_raw(&self, body: Value) -> Response {
        self.send(
            self.client
                .post(format!("{}/v1/discover/swipe", self.base_url))
                .json(&body),
        )
        .await
    }

    /// POST /v1/discover/swipe with display metadata derived from the item id
    pub async fn swipe(&self, item_id: i64, decision: &str, genre_id: Option<u32>) -> Response {
        self.swipe_raw(json!({
            "item_id": item_id,
            "decision": decision,
            "genre_id": genre_id,
            "title": format!("Song {}", item_id),
            "artist_name": "Some Artist",
            "cover_art_url": format!("https://cdn.example/cover/{}.jpg", item_id),
            "preview_url": format!("https://cdn.example/preview/{}.mp3", item_id),
        }))
        .await
    }

    /// GET /v1/discover/liked
    pub async fn get_liked(&self) -> Response {
        self.send(self.client.get(format!("{}/v1/discover/liked", self.base_url)))
            .await
    }

    /// GET /v1/discover/liked, parsed
    pub async fn get_liked_items(&self) -> Vec<Value> {
        let response = self.get_liked().await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Liked items are not JSON")
    }

    /// DELETE /v1/discover/liked/{item_id}
    pub async fn delete_liked(&self, item_id: i64) -> Response {
        self.send(
            self.client
                .delete(format!("{}/v1/discover/liked/{}", self.base_url, item_id)),
        )
        .await
    }

    /// GET /v1/discover/genres
    pub async fn get_genres(&self) -> Response {
        self.send(self.client.get(format!("{}/v1/discover/genres", self.base_url)))
            .await
    }
}
