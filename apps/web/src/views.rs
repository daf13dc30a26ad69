//! Server-rendered markup for the login and dashboard pages.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use shelfmark_client_core::FeedStatus;

/// Signed-in identity shown in the topbar.
pub(crate) struct SessionView {
    pub email: String,
    pub display_name: String,
}

/// One bookmark row, preformatted for display.
pub(crate) struct BookmarkRowView {
    pub id: String,
    pub url: String,
    pub title: String,
    pub host: String,
    pub created_at: String,
    pub pending: bool,
}

pub(crate) enum WebBody {
    Login {
        status: Option<String>,
        sign_in_href: String,
        provider: String,
    },
    Dashboard {
        status: Option<String>,
        query: Option<String>,
        load_failed: bool,
        bookmarks: Vec<BookmarkRowView>,
    },
}

pub(crate) struct WebPage {
    pub title: String,
    pub path: String,
    pub session: Option<SessionView>,
    pub body: WebBody,
}

pub(crate) fn render_page(page: &WebPage) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page.title) " | Shelfmark" }
                style { (PreEscaped(styles())) }
            }
            body {
                (topbar(&page.path, page.session.as_ref()))
                main class="sm-main" {
                    @match &page.body {
                        WebBody::Login { status, sign_in_href, provider } => {
                            (login_panel(status.as_deref(), sign_in_href, provider))
                        }
                        WebBody::Dashboard { status, query, load_failed, bookmarks } => {
                            (dashboard_panel(status.as_deref(), query.as_deref(), *load_failed, bookmarks))
                        }
                    }
                }
            }
        }
    }
    .into_string()
}

/// Standalone list fragment, reused verbatim by the dashboard feed so a
/// pushed update can swap the whole `ul` in place.
pub(crate) fn render_bookmark_list(bookmarks: &[BookmarkRowView]) -> String {
    bookmark_list(bookmarks).into_string()
}

fn topbar(path: &str, session: Option<&SessionView>) -> Markup {
    html! {
        header class="sm-topbar" {
            a class="sm-brand" href="/" { "Shelfmark" }
            @if let Some(session) = session {
                nav class="sm-nav" {
                    a class=(nav_class(path, "/dashboard")) href="/dashboard" { "Dashboard" }
                }
                div class="sm-session" {
                    span class="sm-session-label" {
                        (session.display_name)
                        @if !session.email.is_empty() {
                            " · " (session.email)
                        }
                    }
                    form method="post" action="/auth/sign-out" {
                        button class="sm-linklike" type="submit" { "Sign out" }
                    }
                }
            }
        }
    }
}

fn nav_class(path: &str, href: &str) -> &'static str {
    if path == href || path.strip_prefix(href).is_some_and(|rest| rest.starts_with('/')) {
        "sm-nav-link active"
    } else {
        "sm-nav-link"
    }
}

fn login_panel(status: Option<&str>, sign_in_href: &str, provider: &str) -> Markup {
    html! {
        section class="sm-panel sm-login" {
            h1 { "Sign in to Shelfmark" }
            p class="sm-muted" { "Keep your reading list in one place, on every device." }
            (status_slot("login-status", status))
            a class="sm-button" href=(sign_in_href) { "Continue with " (provider_label(provider)) }
        }
    }
}

fn dashboard_panel(
    status: Option<&str>,
    query: Option<&str>,
    load_failed: bool,
    bookmarks: &[BookmarkRowView],
) -> Markup {
    html! {
        section class="sm-panel" {
            div class="sm-panel-head" {
                h1 { "Bookmarks" }
                span id="feed-status" class="sm-feed-status" { "connecting" }
            }
            (status_slot("dashboard-status", status))
            @if load_failed {
                div class="sm-notice sm-notice-error" {
                    "Could not load bookmarks. Refresh to try again."
                }
            }
            form class="sm-create" method="post" action="/dashboard/bookmarks" {
                label for="bookmark-url" { "URL" }
                input id="bookmark-url" type="url" name="url" placeholder="https://example.com/article" required;
                label for="bookmark-title" { "Title" }
                input id="bookmark-title" type="text" name="title" placeholder="Something worth keeping" required;
                button class="sm-button" type="submit" { "Save bookmark" }
            }
            form class="sm-search" method="get" action="/dashboard" {
                input type="search" name="q" value=[query] placeholder="Search title or URL";
                button class="sm-button sm-button-quiet" type="submit" { "Search" }
                @if query.is_some() {
                    a class="sm-clear" href="/dashboard" { "Clear" }
                }
            }
            (bookmark_list(bookmarks))
            script { (PreEscaped(FEED_SCRIPT)) }
        }
    }
}

fn bookmark_list(bookmarks: &[BookmarkRowView]) -> Markup {
    html! {
        ul id="bookmark-list" class="sm-bookmarks" {
            @if bookmarks.is_empty() {
                li class="sm-empty" { "No bookmarks yet. Save your first link above." }
            }
            @for row in bookmarks {
                li class=(row_class(row.pending)) {
                    div class="sm-bookmark-main" {
                        a class="sm-bookmark-title" href=(row.url) target="_blank" rel="noreferrer" {
                            (row.title)
                        }
                        span class="sm-bookmark-meta" { (row.host) " · " (row.created_at) }
                    }
                    form method="post" action={ "/dashboard/bookmarks/" (row.id) "/delete" } {
                        button class="sm-linklike sm-danger" type="submit" { "Delete" }
                    }
                }
            }
        }
    }
}

fn row_class(pending: bool) -> &'static str {
    if pending {
        "sm-bookmark pending"
    } else {
        "sm-bookmark"
    }
}

fn status_slot(target_id: &str, status: Option<&str>) -> Markup {
    match status {
        Some(code) => html! {
            div id=(target_id) class="sm-notice" { (status_message(code)) }
        },
        None => html! {
            div id=(target_id) hidden {}
        },
    }
}

fn status_message(status: &str) -> &'static str {
    match status {
        "signed-out" => "Signed out.",
        "auth-failed" => "Sign-in failed. Try again.",
        "callback-invalid" => "The sign-in link was invalid or expired. Try again.",
        "empty-title" => "Title cannot be empty.",
        "empty-url" => "URL cannot be empty.",
        "invalid-url" => "Enter a valid URL, including the scheme.",
        "saved" => "Bookmark saved.",
        "save-failed" => "Could not save bookmark.",
        "deleted" => "Bookmark deleted.",
        "delete-failed" => "Could not delete bookmark.",
        _ => "Action completed.",
    }
}

/// Short label for the topbar feed indicator.
pub(crate) fn feed_status_label(status: FeedStatus) -> &'static str {
    match status {
        FeedStatus::Connecting => "connecting",
        FeedStatus::Subscribed => "live",
        FeedStatus::ChannelError => "realtime unavailable",
        FeedStatus::TimedOut => "realtime timed out",
    }
}

fn provider_label(provider: &str) -> String {
    let mut chars = provider.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Subscribes the dashboard to `/dashboard/feed` and swaps the bookmark
/// list whenever the server pushes a new fragment. The current query
/// string rides along so pushed fragments honor an active search.
const FEED_SCRIPT: &str = r#"
(function () {
  var list = document.getElementById("bookmark-list");
  var status = document.getElementById("feed-status");
  if (!list || !status || typeof EventSource === "undefined") {
    return;
  }
  var source = new EventSource("/dashboard/feed" + window.location.search);
  source.onmessage = function (message) {
    var payload;
    try {
      payload = JSON.parse(message.data);
    } catch (error) {
      return;
    }
    if (typeof payload.html === "string") {
      list.outerHTML = payload.html;
      list = document.getElementById("bookmark-list");
    }
    status.textContent = payload.notice
      ? payload.label + " · " + payload.notice
      : payload.label;
    status.className = payload.degraded
      ? "sm-feed-status degraded"
      : "sm-feed-status";
  };
})();
"#;

fn styles() -> &'static str {
    r#"
:root { color-scheme: light; }
* { box-sizing: border-box; }
body {
  margin: 0;
  font-family: "Inter", "Helvetica Neue", Arial, sans-serif;
  background: #f4f5f7;
  color: #1d2530;
}
.sm-topbar {
  display: flex;
  align-items: center;
  gap: 24px;
  padding: 14px 28px;
  background: #ffffff;
  border-bottom: 1px solid #e2e6eb;
}
.sm-brand {
  font-weight: 700;
  font-size: 18px;
  color: #3742a8;
  text-decoration: none;
}
.sm-nav { display: flex; gap: 16px; }
.sm-nav-link { color: #5a6572; text-decoration: none; font-size: 14px; }
.sm-nav-link.active { color: #1d2530; font-weight: 600; }
.sm-session { margin-left: auto; display: flex; align-items: center; gap: 12px; }
.sm-session-label { font-size: 13px; color: #5a6572; }
.sm-main { max-width: 760px; margin: 32px auto; padding: 0 20px; }
.sm-panel {
  background: #ffffff;
  border: 1px solid #e2e6eb;
  border-radius: 10px;
  padding: 24px 28px;
}
.sm-panel-head { display: flex; align-items: baseline; justify-content: space-between; }
.sm-panel h1 { margin: 0 0 12px; font-size: 22px; }
.sm-login { max-width: 420px; margin: 48px auto 0; text-align: center; }
.sm-muted { color: #5a6572; font-size: 14px; }
.sm-notice {
  margin: 12px 0;
  padding: 10px 14px;
  border-radius: 8px;
  background: #eef1fb;
  border: 1px solid #c9d2f0;
  font-size: 14px;
}
.sm-notice-error { background: #fbeeee; border-color: #efc5c5; }
.sm-button {
  display: inline-block;
  border: 0;
  border-radius: 8px;
  padding: 10px 18px;
  background: #3742a8;
  color: #ffffff;
  font-size: 14px;
  text-decoration: none;
  cursor: pointer;
}
.sm-button-quiet { background: #e7eaf0; color: #1d2530; }
.sm-linklike {
  border: 0;
  background: none;
  padding: 0;
  color: #3742a8;
  font-size: 13px;
  cursor: pointer;
}
.sm-danger { color: #b43434; }
.sm-create { display: grid; gap: 6px; margin: 16px 0 20px; }
.sm-create label { font-size: 13px; color: #5a6572; }
.sm-create input {
  padding: 9px 12px;
  border: 1px solid #cfd5dd;
  border-radius: 8px;
  font-size: 14px;
}
.sm-create button { justify-self: start; margin-top: 6px; }
.sm-search { display: flex; align-items: center; gap: 10px; margin-bottom: 18px; }
.sm-search input {
  flex: 1;
  padding: 8px 12px;
  border: 1px solid #cfd5dd;
  border-radius: 8px;
  font-size: 14px;
}
.sm-clear { font-size: 13px; color: #5a6572; }
.sm-feed-status { font-size: 12px; color: #4e7d4e; }
.sm-feed-status.degraded { color: #b43434; }
.sm-bookmarks { list-style: none; margin: 0; padding: 0; }
.sm-bookmark {
  display: flex;
  align-items: center;
  justify-content: space-between;
  gap: 16px;
  padding: 12px 4px;
  border-top: 1px solid #eceff3;
}
.sm-bookmark.pending { opacity: 0.6; }
.sm-bookmark-main { display: grid; gap: 2px; }
.sm-bookmark-title { color: #1d2530; font-size: 15px; text-decoration: none; }
.sm-bookmark-title:hover { text-decoration: underline; }
.sm-bookmark-meta { font-size: 12px; color: #8a93a0; }
.sm-empty { padding: 18px 4px; color: #8a93a0; font-size: 14px; }
"#
}
