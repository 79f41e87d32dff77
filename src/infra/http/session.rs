//! Cookie sessions: resolve the viewer once per request and gate private routes.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

use crate::application::auth::IssuedSession;
use crate::domain::entities::UserRecord;
use crate::presentation::views::login_href;

use super::{HttpState, repo_error_to_http};

pub const SESSION_COOKIE: &str = "yatube_session";

/// Attach the signed-in user (if any) to the request extensions.
pub async fn load_session(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.auth.authenticate(cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(err) => {
                return repo_error_to_http("infra::http::session::load_session", err)
                    .into_response();
            }
        }
    }

    next.run(request).await
}

/// The viewer, if signed in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<UserRecord>);

impl CurrentUser {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<UserRecord>().cloned()))
    }
}

/// A signed-in viewer. Anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserRecord);

pub struct LoginRedirect {
    next: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&login_href(&self.next)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequireUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserRecord>()
            .cloned()
            .map(Self)
            .ok_or_else(|| LoginRedirect {
                next: parts.uri.path().to_string(),
            })
    }
}

pub fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(session.expires_at)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Only same-site absolute paths are honoured as post-login targets.
pub fn safe_next(next: &str) -> &str {
    let next = next.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}
