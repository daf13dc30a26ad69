//! Request gating: every non-bypass request resolves the session cookies
//! before routing, redirecting visitors who are on the wrong side of the
//! signed-in boundary.

use super::*;

/// Routing policy for a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum RouteClass {
    /// Sign-in surface. Established sessions are bounced to the dashboard.
    AuthPage,
    /// Requires a session. Anonymous requests are bounced to sign-in.
    Protected,
    /// Served without touching the session at all.
    Bypass,
    /// Resolved for personalization but reachable either way.
    Public,
}

/// The OAuth handshake routes are bypassed on purpose: they manage the
/// session cookies themselves, and a gate-appended clear would land after
/// the callback's set-cookie headers and win in the browser.
pub(super) fn classify_route(path: &str) -> RouteClass {
    if path == "/" || path == "/login" {
        return RouteClass::AuthPage;
    }
    if path == "/dashboard" || path.starts_with("/dashboard/") {
        return RouteClass::Protected;
    }
    if path.starts_with("/auth/")
        || path.starts_with("/assets/")
        || path == "/favicon.ico"
        || path == "/robots.txt"
        || path == "/healthz"
    {
        return RouteClass::Bypass;
    }
    RouteClass::Public
}

/// Verified identity for the current request, stashed as an extension for
/// downstream handlers.
#[derive(Clone, Debug)]
pub(super) struct SessionContext {
    pub user: AuthenticatedUser,
    pub access_token: String,
}

/// What the gate learned from the cookies, plus any set-cookie headers the
/// response must carry (token rotation or teardown).
pub(super) struct SessionOutcome {
    pub context: Option<SessionContext>,
    pub mutations: Vec<CookieMutation>,
}

impl SessionOutcome {
    pub(super) fn anonymous() -> Self {
        Self {
            context: None,
            mutations: Vec::new(),
        }
    }
}

pub(super) async fn session_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let class = classify_route(request.uri().path());
    if class == RouteClass::Bypass {
        return next.run(request).await;
    }

    let outcome = resolve_session(&state, request.headers()).await;

    let mut response = match (class, outcome.context) {
        (RouteClass::Protected, None) => {
            Redirect::temporary(&login_redirect_target(request.uri())).into_response()
        }
        (RouteClass::AuthPage, Some(_)) => Redirect::temporary("/dashboard").into_response(),
        (_, maybe_context) => {
            if let Some(context) = maybe_context {
                request.extensions_mut().insert(context);
            }
            next.run(request).await
        }
    };

    // Rotation and teardown ride on whatever response goes out, redirects
    // included, so a refreshed token is never lost to a bounce.
    apply_cookie_mutations(&mut response, &outcome.mutations);
    response
}

/// Resolves the session cookies against the platform. Fail-closed on
/// rejection, fail-open on outage: a definitive "no such session" clears
/// the cookies, while an unreachable provider leaves them untouched and
/// treats the request as anonymous.
pub(super) async fn resolve_session(state: &AppState, headers: &HeaderMap) -> SessionOutcome {
    let cookie_header = headers.get(COOKIE).and_then(|value| value.to_str().ok());
    let cookies = SessionCookies::from_cookie_header(cookie_header);
    if cookies.is_empty() {
        return SessionOutcome::anonymous();
    }

    if let Some(access_token) = cookies.access_token.as_deref() {
        match state.platform.auth().fetch_user(access_token).await {
            Ok(user) => {
                return SessionOutcome {
                    context: Some(SessionContext {
                        user,
                        access_token: access_token.to_string(),
                    }),
                    mutations: Vec::new(),
                };
            }
            Err(error) if error.is_rejection() => {
                debug!(%error, "access token rejected, attempting refresh");
            }
            Err(error) => {
                warn!(%error, "session validation unavailable, treating request as anonymous");
                return SessionOutcome::anonymous();
            }
        }
    }

    let Some(refresh_token) = cookies.refresh_token.as_deref() else {
        return SessionOutcome {
            context: None,
            mutations: clear_session_cookies(),
        };
    };

    match state.platform.auth().refresh_session(refresh_token).await {
        Ok(session) => {
            let mutations = set_session_cookies(&session, state.config.refresh_cookie_ttl_seconds);
            let AuthSession {
                access_token, user, ..
            } = session;
            SessionOutcome {
                context: Some(SessionContext {
                    user: user.into_principal(),
                    access_token,
                }),
                mutations,
            }
        }
        Err(error) if error.is_rejection() => {
            debug!(%error, "refresh grant rejected, clearing session cookies");
            SessionOutcome {
                context: None,
                mutations: clear_session_cookies(),
            }
        }
        Err(error) => {
            warn!(%error, "session refresh unavailable, treating request as anonymous");
            SessionOutcome::anonymous()
        }
    }
}

/// Builds the sign-in redirect target, preserving where the visitor was
/// headed so the callback can send them back.
pub(super) fn login_redirect_target(uri: &Uri) -> String {
    let mut from = uri.path().to_string();
    if let Some(query) = uri.query() {
        from.push('?');
        from.push_str(query);
    }
    format!("/?redirectedFrom={}", urlencode(&from))
}

pub(super) fn apply_cookie_mutations(response: &mut Response, mutations: &[CookieMutation]) {
    for mutation in mutations {
        match HeaderValue::from_str(&mutation.header_value()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(error) => {
                warn!(%error, cookie = mutation.name(), "dropping unencodable set-cookie header");
            }
        }
    }
}
