//! Session-gated web front end for personal bookmarks.
//!
//! Every request passes a session gate that resolves the cookie pair
//! against the platform before routing. The dashboard is rendered
//! server-side and kept current per tab through a server-sent event
//! stream backed by a reconciliation engine.

#![cfg_attr(test, allow(clippy::expect_used))]

use std::convert::Infallible;
use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{Extension, Form, Path, Request, State};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use shelfmark_client_core::{
    AuthenticatedUser, Bookmark, BookmarkCollection, FeedStatus, NewBookmark, SyncEngine, SyncView,
    ValidationError,
};
use shelfmark_platform_client::session_cookies::{
    clear_session_cookies, extract_cookie_value, set_session_cookies,
};
use shelfmark_platform_client::{
    AuthSession, CookieMutation, FeedGuard, PKCE_VERIFIER_COOKIE, PkcePair, PlatformClient,
    SessionCookies,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod config;
mod handlers;
mod session_gate;
mod views;

use config::Config;
use handlers::*;
use session_gate::*;
use views::{
    BookmarkRowView, SessionView, WebBody, WebPage, feed_status_label, render_bookmark_list,
    render_page,
};

const SERVICE_NAME: &str = "shelfmark-web";

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    platform: PlatformClient,
    started_at: SystemTime,
}

pub fn build_router(config: Config, platform: PlatformClient) -> Router {
    let state = AppState {
        config: Arc::new(config),
        platform,
        started_at: SystemTime::now(),
    };
    let gate_state = state.clone();

    Router::new()
        .route("/", get(login_page))
        .route("/login", get(login_page))
        .route("/auth/sign-in", get(oauth_sign_in))
        .route("/auth/callback", get(oauth_callback))
        .route("/auth/sign-out", post(sign_out))
        .route("/dashboard", get(dashboard_page))
        .route("/dashboard/bookmarks", post(create_bookmark))
        .route("/dashboard/bookmarks/:id/delete", post(delete_bookmark))
        .route("/dashboard/feed", get(dashboard_feed))
        .route("/healthz", get(health))
        .route("/robots.txt", get(robots))
        .route("/favicon.ico", get(favicon))
        .with_state(state)
        .layer(middleware::from_fn_with_state(gate_state, session_gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
}

/// Decoded value of one query parameter, with blanks treated as absent.
fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name.as_ref() == key)
        .map(|(_, value)| value.into_owned())
        .and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Accepts only same-site absolute paths as redirect targets, so a
/// crafted link cannot bounce a visitor off-site after sign-in.
fn is_safe_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
