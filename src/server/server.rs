use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, error, info};

use crate::discovery::{Candidate, DiscoveryEngine, DiscoveryError, Genre, SwipeInput};
use crate::interactions::{DisplayMetadata, GenreId, ItemId, LikedItem};
use crate::user::auth::AuthTokenValue;
use crate::user::UserManager;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{
    log_requests, metrics, no_cache,
    session::{Session, Viewer, COOKIE_SESSION_TOKEN_KEY},
    state::*,
    RequestsLoggingLevel, ServerConfig,
};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CredentialsBody {
    pub user_handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct RegisterSuccessResponse {
    user_id: usize,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Deserialize, Debug)]
struct ForgotPasswordBody {
    pub user_handle: String,
}

/// No mail delivery is wired in, the token goes back to the caller.
#[derive(Serialize)]
struct ForgotPasswordResponse {
    message: &'static str,
    debug_token: String,
}

#[derive(Deserialize, Debug)]
struct ResetPasswordBody {
    pub token: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct GenresBody {
    pub genre_ids: Vec<GenreId>,
}

#[derive(Deserialize, Debug)]
struct SwipeBody {
    pub item_id: ItemId,
    /// Kept loose so a missing or mistyped decision is an invalid decision,
    /// not a body rejection.
    pub decision: Option<serde_json::Value>,
    pub genre_id: Option<GenreId>,
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub cover_art_url: Option<String>,
    pub preview_url: Option<String>,
}

impl From<SwipeBody> for SwipeInput {
    fn from(body: SwipeBody) -> Self {
        SwipeInput {
            item_id: body.item_id,
            decision: match body.decision {
                Some(serde_json::Value::String(decision)) => decision,
                Some(other) => other.to_string(),
                None => String::new(),
            },
            genre_id: body.genre_id,
            metadata: DisplayMetadata {
                title: body.title,
                artist_name: body.artist_name,
                cover_art_url: body.cover_art_url,
                preview_url: body.preview_url,
            },
        }
    }
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

const SUCCESS: SuccessResponse = SuccessResponse { success: true };

impl IntoResponse for DiscoveryError {
    fn into_response(self) -> Response {
        let status = match &self {
            DiscoveryError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            DiscoveryError::InvalidIdentity | DiscoveryError::InvalidDecision(_) => {
                StatusCode::BAD_REQUEST
            }
            DiscoveryError::Store(err) => {
                error!("Store failure: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

/// Runs a user manager call on the blocking pool, password hashing is too
/// slow for the async workers.
async fn with_user_manager_blocking<T, F>(user_manager: &GuardedUserManager, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&UserManager) -> Result<T> + Send + 'static,
{
    let user_manager = user_manager.clone();
    tokio::task::spawn_blocking(move || f(&user_manager))
        .await
        .context("User manager task failed")?
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    let user_handle = body.user_handle.clone();
    let result = with_user_manager_blocking(&user_manager, move |user_manager| {
        user_manager.register(&body.user_handle, &body.password)
    })
    .await;
    match result {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(RegisterSuccessResponse { user_id }),
        )
            .into_response(),
        Err(err) => {
            debug!("Registration of {} refused: {}", user_handle, err);
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    debug!("login() called for {}", body.user_handle);
    let login_result = with_user_manager_blocking(&user_manager, move |user_manager| {
        user_manager.login(&body.user_handle, &body.password)
    })
    .await;
    match login_result {
        Ok(Some(auth_token)) => {
            let response_body = LoginSuccessResponse {
                token: auth_token.value.0.clone(),
            };
            let response_body = match serde_json::to_string(&response_body) {
                Ok(body) => body,
                Err(err) => {
                    error!("Could not serialize login response: {}", err);
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            let cookie_value = match HeaderValue::from_str(&format!(
                "{}={}; Path=/; HttpOnly",
                COOKIE_SESSION_TOKEN_KEY, auth_token.value.0
            )) {
                Ok(value) => value,
                Err(err) => {
                    error!("Invalid session cookie: {}", err);
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            response::Builder::new()
                .status(StatusCode::CREATED)
                .header(header::SET_COOKIE, cookie_value)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(response_body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Ok(None) => StatusCode::FORBIDDEN.into_response(),
        Err(err) => {
            error!("Error with auth token generation: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn forgot_password(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<ForgotPasswordBody>,
) -> Response {
    match user_manager.request_password_reset(&body.user_handle) {
        Ok(Some(token)) => Json(ForgotPasswordResponse {
            message: "Password reset token issued",
            debug_token: token.value,
        })
        .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Could not issue password reset token: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn reset_password(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<ResetPasswordBody>,
) -> Response {
    let result = with_user_manager_blocking(&user_manager, move |user_manager| {
        user_manager.reset_password(&body.token, &body.password)
    })
    .await;
    match result {
        Ok(true) => Json(SUCCESS).into_response(),
        Ok(false) => (StatusCode::FORBIDDEN, "Invalid or expired reset token").into_response(),
        Err(err) => {
            debug!("Password reset refused: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    match user_manager.logout(session.user_id, &AuthTokenValue(session.token)) {
        Ok(()) => {
            let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();
            (
                StatusCode::OK,
                [(header::SET_COOKIE, cookie_value.to_string())],
            )
                .into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn get_user_genres(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Response {
    match user_manager.get_preferred_genres(session.user_id) {
        Ok(genre_ids) => Json(GenresBody { genre_ids }).into_response(),
        Err(err) => {
            error!("Could not read genres of user {}: {}", session.user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn put_user_genres(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<GenresBody>,
) -> Response {
    match user_manager.set_preferred_genres(session.user_id, &body.genre_ids) {
        Ok(genre_ids) => Json(GenresBody { genre_ids }).into_response(),
        Err(err) => {
            error!("Could not store genres of user {}: {}", session.user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_discover(
    viewer: Viewer,
    State(user_manager): State<GuardedUserManager>,
    State(discovery): State<GuardedDiscoveryEngine>,
) -> Result<Json<Vec<Candidate>>, DiscoveryError> {
    let preferences = match viewer.user_id {
        Some(user_id) => user_manager.get_preferred_genres(user_id)?,
        None => vec![],
    };
    let feed = discovery
        .compose_feed(viewer.identity.as_ref(), &preferences)
        .await?;
    Ok(Json(feed))
}

async fn post_swipe(
    viewer: Viewer,
    State(discovery): State<GuardedDiscoveryEngine>,
    Json(body): Json<SwipeBody>,
) -> Result<Json<SuccessResponse>, DiscoveryError> {
    discovery.record_decision(viewer.identity.as_ref(), body.into())?;
    Ok(Json(SUCCESS))
}

async fn get_liked(
    viewer: Viewer,
    State(discovery): State<GuardedDiscoveryEngine>,
) -> Result<Json<Vec<LikedItem>>, DiscoveryError> {
    Ok(Json(discovery.list_liked_items(viewer.identity.as_ref())?))
}

async fn delete_liked(
    viewer: Viewer,
    State(discovery): State<GuardedDiscoveryEngine>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<SuccessResponse>, DiscoveryError> {
    discovery.remove_liked_item(viewer.identity.as_ref(), item_id)?;
    Ok(Json(SUCCESS))
}

async fn get_genres(State(discovery): State<GuardedDiscoveryEngine>) -> Json<Vec<Genre>> {
    Json(discovery.taxonomy().genres().to_vec())
}

impl ServerState {
    fn new(
        config: ServerConfig,
        user_manager: GuardedUserManager,
        discovery: GuardedDiscoveryEngine,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            user_manager,
            discovery,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    user_manager: GuardedUserManager,
    discovery: GuardedDiscoveryEngine,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), user_manager, discovery);

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/genres", get(get_user_genres).put(put_user_genres))
        .with_state(state.clone());

    let feed_routes: Router = Router::new()
        .route("/", get(get_discover))
        .layer(middleware::from_fn(no_cache))
        .with_state(state.clone());

    let discover_routes: Router = Router::new()
        .route("/swipe", post(post_swipe))
        .route("/liked", get(get_liked))
        .route("/liked/{item_id}", delete(delete_liked))
        .route("/genres", get(get_genres))
        .with_state(state.clone())
        .merge(feed_routes);

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/user", user_routes)
        .nest("/v1/discover", discover_routes);

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(
    user_manager: GuardedUserManager,
    discovery: DiscoveryEngine,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    metrics_port: u16,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
    };
    let app = make_app(config, user_manager, Arc::new(discovery))?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Could not bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Could not bind metrics port {}", metrics_port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    let main_server = async { axum::serve(listener, app).await };
    let metrics_server = async { axum::serve(metrics_listener, make_metrics_app()).await };
    tokio::try_join!(main_server, metrics_server)?;
    Ok(())
}
