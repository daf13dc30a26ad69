//! Route handlers: pages, the OAuth handshake, bookmark mutations, and
//! the dashboard feed.

use super::*;

pub(super) async fn login_page(State(state): State<AppState>, uri: Uri) -> Response {
    let status = query_param(uri.query(), "status");
    let next = query_param(uri.query(), "redirectedFrom").filter(|path| is_safe_local_path(path));

    let sign_in_href = match next {
        Some(next) => format!("/auth/sign-in?next={}", urlencode(&next)),
        None => "/auth/sign-in".to_string(),
    };

    let page = WebPage {
        title: "Sign in".to_string(),
        path: uri.path().to_string(),
        session: None,
        body: WebBody::Login {
            status,
            sign_in_href,
            provider: state.config.oauth_provider.clone(),
        },
    };
    Html(render_page(&page)).into_response()
}

/// Starts the handshake: mints a PKCE pair, parks the verifier in a
/// short-lived cookie, and bounces to the provider.
pub(super) async fn oauth_sign_in(State(state): State<AppState>, uri: Uri) -> Response {
    let next = query_param(uri.query(), "next").filter(|path| is_safe_local_path(path));

    let pkce = PkcePair::generate();
    let callback = format!("{}/auth/callback", state.config.site_url.trim_end_matches('/'));
    let redirect_to = match next {
        Some(next) => format!("{callback}?next={}", urlencode(&next)),
        None => callback,
    };

    match state
        .platform
        .auth()
        .authorize_url(&state.config.oauth_provider, &redirect_to, &pkce.challenge)
    {
        Ok(url) => {
            let mut response = Redirect::temporary(url.as_str()).into_response();
            apply_cookie_mutations(
                &mut response,
                &[CookieMutation::set(
                    PKCE_VERIFIER_COOKIE,
                    pkce.verifier,
                    state.config.verifier_cookie_ttl_seconds,
                )],
            );
            response
        }
        Err(error) => {
            warn!(%error, "authorize url construction failed");
            Redirect::temporary("/login?status=auth-failed").into_response()
        }
    }
}

/// Finishes the handshake: trades the provider's code plus the parked
/// verifier for a session, then drops the visitor where they were headed.
/// The verifier cookie is single-use and cleared on every outcome.
pub(super) async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let code = query_param(uri.query(), "code");
    let next = query_param(uri.query(), "next").filter(|path| is_safe_local_path(path));

    let cookie_header = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let verifier = extract_cookie_value(cookie_header, PKCE_VERIFIER_COOKIE);

    let (Some(code), Some(verifier)) = (code, verifier) else {
        let mut response = Redirect::temporary("/login?status=callback-invalid").into_response();
        apply_cookie_mutations(&mut response, &[CookieMutation::clear(PKCE_VERIFIER_COOKIE)]);
        return response;
    };

    match state.platform.auth().exchange_code(&code, &verifier).await {
        Ok(session) => {
            let mut mutations =
                set_session_cookies(&session, state.config.refresh_cookie_ttl_seconds);
            mutations.push(CookieMutation::clear(PKCE_VERIFIER_COOKIE));
            let target = next.unwrap_or_else(|| "/dashboard".to_string());
            let mut response = Redirect::temporary(&target).into_response();
            apply_cookie_mutations(&mut response, &mutations);
            response
        }
        Err(error) => {
            warn!(%error, "code exchange failed");
            let mut response = Redirect::temporary("/login?status=auth-failed").into_response();
            apply_cookie_mutations(&mut response, &[CookieMutation::clear(PKCE_VERIFIER_COOKIE)]);
            response
        }
    }
}

/// Local sign-out always succeeds; the provider-side revocation is best
/// effort.
pub(super) async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie_header = headers.get(COOKIE).and_then(|value| value.to_str().ok());
    let cookies = SessionCookies::from_cookie_header(cookie_header);

    if let Some(access_token) = cookies.access_token.as_deref() {
        if let Err(error) = state.platform.auth().sign_out(access_token).await {
            warn!(%error, "provider sign-out failed");
        }
    }

    let mut response = Redirect::to("/login?status=signed-out").into_response();
    apply_cookie_mutations(&mut response, &clear_session_cookies());
    response
}

pub(super) async fn dashboard_page(
    State(state): State<AppState>,
    Extension(context): Extension<SessionContext>,
    uri: Uri,
) -> Response {
    let status = query_param(uri.query(), "status");
    let query = query_param(uri.query(), "q");

    let api = state.platform.bookmarks(&context.access_token);
    let (collection, load_failed) = match api.list().await {
        Ok(rows) => (BookmarkCollection::from_snapshot(rows), false),
        Err(error) => {
            warn!(%error, "dashboard snapshot load failed");
            (BookmarkCollection::new(), true)
        }
    };

    let bookmarks: Vec<BookmarkRowView> = match query.as_deref() {
        Some(q) => collection.search(q),
        None => collection.bookmarks().collect(),
    }
    .into_iter()
    .map(|bookmark| bookmark_row(bookmark, false))
    .collect();

    let page = WebPage {
        title: "Bookmarks".to_string(),
        path: "/dashboard".to_string(),
        session: Some(session_view(&context)),
        body: WebBody::Dashboard {
            status,
            query,
            load_failed,
            bookmarks,
        },
    };
    Html(render_page(&page)).into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateBookmarkForm {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
}

pub(super) async fn create_bookmark(
    State(state): State<AppState>,
    Extension(context): Extension<SessionContext>,
    Form(form): Form<CreateBookmarkForm>,
) -> Response {
    let draft = match NewBookmark::parse(&form.url, &form.title) {
        Ok(draft) => draft,
        Err(error) => {
            // Rejected locally; the platform never sees the request.
            let target = format!("/dashboard?status={}", validation_status(&error));
            return Redirect::to(&target).into_response();
        }
    };

    let row = draft.into_bookmark(Uuid::new_v4().to_string(), &context.user.id, Utc::now());
    let api = state.platform.bookmarks(&context.access_token);
    match api.insert(&row).await {
        Ok(saved) => {
            debug!(id = %saved.id, "bookmark saved");
            Redirect::to("/dashboard?status=saved").into_response()
        }
        Err(error) => {
            warn!(%error, "bookmark insert failed");
            Redirect::to("/dashboard?status=save-failed").into_response()
        }
    }
}

pub(super) async fn delete_bookmark(
    State(state): State<AppState>,
    Extension(context): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Response {
    let api = state.platform.bookmarks(&context.access_token);
    match api.delete(&id).await {
        Ok(()) => Redirect::to("/dashboard?status=deleted").into_response(),
        Err(error) => {
            warn!(%error, id, "bookmark delete failed");
            Redirect::to("/dashboard?status=delete-failed").into_response()
        }
    }
}

/// Per-tab live feed. Each request gets its own snapshot, realtime
/// subscription, and reconciliation engine; closing the tab drops the
/// stream, which drops the guard and tears the subscription down.
pub(super) async fn dashboard_feed(
    State(state): State<AppState>,
    Extension(context): Extension<SessionContext>,
    uri: Uri,
) -> Response {
    let query = query_param(uri.query(), "q");

    let api = state.platform.bookmarks(&context.access_token);
    let snapshot = match api.list().await {
        Ok(rows) => rows,
        Err(error) => {
            warn!(%error, "feed snapshot load failed");
            return degraded_feed_response("Snapshot load failed.");
        }
    };

    let realtime = match state.platform.realtime(state.config.realtime_config()) {
        Ok(realtime) => realtime,
        Err(error) => {
            warn!(%error, "realtime endpoint unavailable");
            return degraded_feed_response("Realtime is unavailable.");
        }
    };
    let (feed_rx, feed_guard) = realtime.open_bookmark_feed(&context.user.id, &context.access_token);

    let (engine, view_rx) = SyncEngine::new(context.user.id.clone(), Arc::new(api), snapshot);
    tokio::spawn(engine.run(feed_rx));

    let stream = feed_view_stream(view_rx, feed_guard, query);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = match state.started_at.elapsed() {
        Ok(elapsed) => elapsed.as_secs(),
        Err(_) => 0,
    };
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
    })
}

pub(super) async fn robots() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "User-agent: *\nAllow: /\n",
    )
}

pub(super) async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// One wire event for the dashboard feed. `html` is the replacement list
/// fragment; it is absent on degraded one-shot streams so the page keeps
/// the rows it already has.
#[derive(Debug, Serialize)]
struct FeedEventPayload<'a> {
    status: &'static str,
    label: &'static str,
    degraded: bool,
    notice: Option<&'a str>,
    html: Option<String>,
}

fn feed_payload_event(payload: &FeedEventPayload<'_>) -> Event {
    Event::default().json_data(payload).unwrap_or_else(|error| {
        warn!(%error, "feed payload failed to serialize");
        Event::default().data("{}")
    })
}

/// Single-event stream for requests that never got as far as an engine.
fn degraded_feed_response(notice: &str) -> Response {
    let event = feed_payload_event(&FeedEventPayload {
        status: FeedStatus::ChannelError.as_str(),
        label: feed_status_label(FeedStatus::ChannelError),
        degraded: true,
        notice: Some(notice),
        html: None,
    });
    let stream = stream::iter([Ok::<_, Infallible>(event)]);
    Sse::new(stream).into_response()
}

struct FeedStreamState {
    view_rx: watch::Receiver<SyncView>,
    query: Option<String>,
    primed: bool,
    // Held for the stream's lifetime; dropping it leaves the channel.
    _guard: FeedGuard,
}

/// Turns the engine's view channel into an SSE event stream. The first
/// poll emits the current view so a fresh tab paints immediately; after
/// that, one event per published change. The stream ends when the engine
/// side of the channel goes away.
fn feed_view_stream(
    view_rx: watch::Receiver<SyncView>,
    guard: FeedGuard,
    query: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let state = FeedStreamState {
        view_rx,
        query,
        primed: false,
        _guard: guard,
    };
    stream::unfold(state, |mut state| async move {
        if state.primed && state.view_rx.changed().await.is_err() {
            return None;
        }
        state.primed = true;
        let view = state.view_rx.borrow_and_update().clone();
        let event = view_event(&view, state.query.as_deref());
        Some((Ok(event), state))
    })
}

fn view_event(view: &SyncView, query: Option<&str>) -> Event {
    let rows = feed_rows(view, query);
    feed_payload_event(&FeedEventPayload {
        status: view.status.as_str(),
        label: feed_status_label(view.status),
        degraded: view.status.is_degraded(),
        notice: view.notice.as_deref(),
        html: Some(render_bookmark_list(&rows)),
    })
}

/// Applies the tab's active search to a pushed view so live updates never
/// clobber a filtered list with unfiltered rows.
fn feed_rows(view: &SyncView, query: Option<&str>) -> Vec<BookmarkRowView> {
    let needle = query
        .map(|raw| raw.trim().to_lowercase())
        .filter(|needle| !needle.is_empty());
    view.entries
        .iter()
        .filter(|entry| {
            needle
                .as_deref()
                .is_none_or(|needle| entry.bookmark.matches_lowercase(needle))
        })
        .map(|entry| bookmark_row(&entry.bookmark, entry.is_pending()))
        .collect()
}

fn bookmark_row(bookmark: &Bookmark, pending: bool) -> BookmarkRowView {
    BookmarkRowView {
        id: bookmark.id.clone(),
        url: bookmark.url.clone(),
        title: bookmark.title.clone(),
        host: bookmark.display_host(),
        created_at: bookmark.created_at.format("%b %-d, %Y").to_string(),
        pending,
    }
}

fn session_view(context: &SessionContext) -> SessionView {
    SessionView {
        email: context.user.email.clone().unwrap_or_default(),
        display_name: context.user.display_name(),
    }
}

fn validation_status(error: &ValidationError) -> &'static str {
    match error {
        ValidationError::EmptyTitle => "empty-title",
        ValidationError::EmptyUrl => "empty-url",
        ValidationError::UrlUnparseable(_) | ValidationError::UrlMissingHost => "invalid-url",
    }
}
