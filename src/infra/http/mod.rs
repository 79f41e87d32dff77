mod auth;
mod authoring;
mod follows;
mod middleware;
mod public;
mod session;

pub use public::build_router;
pub use session::{CurrentUser, RequireUser, SESSION_COOKIE};

use std::error::Error as StdError;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::auth::{AuthError, AuthService};
use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{FeedError, FeedService};
use crate::application::follows::{FollowError, FollowService};
use crate::application::posts::{AuthoringError, PostService};
use crate::application::repos::{HealthRepo, RepoError};
use crate::cache::CacheState;
use crate::infra::uploads::MediaStorage;
use crate::presentation::views::{LayoutChrome, render_not_found_response};

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: CacheState,
    pub cookie_secure: bool,
    pub max_request_bytes: usize,
}

fn db_health_response<E: StdError>(result: Result<(), E>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Lookup misses render the 404 page; anything else becomes a plain error response.
fn feed_error_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_) => {
            render_not_found_response(chrome, &err.to_string())
        }
        FeedError::Repo(err) => repo_error_to_http("infra::http::feed", err).into_response(),
    }
}

fn authoring_error_response(err: AuthoringError, chrome: LayoutChrome) -> Response {
    const SOURCE: &str = "infra::http::authoring";
    match err {
        AuthoringError::UnknownPost(_) => render_not_found_response(chrome, &err.to_string()),
        AuthoringError::Repo(RepoError::NotFound) => {
            render_not_found_response(chrome, "post disappeared during the request")
        }
        AuthoringError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
        AuthoringError::Media(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store image",
            &err,
        )
        .into_response(),
        AuthoringError::Invalid(errors) => HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid form",
            errors.to_string(),
        )
        .into_response(),
    }
}

fn follow_error_response(err: FollowError, chrome: LayoutChrome) -> Response {
    match err {
        FollowError::UnknownAuthor(_) | FollowError::NotFollowing { .. } => {
            render_not_found_response(chrome, &err.to_string())
        }
        FollowError::Repo(err) => repo_error_to_http("infra::http::follows", err).into_response(),
    }
}

fn auth_error_response(err: AuthError) -> Response {
    const SOURCE: &str = "infra::http::auth";
    match err {
        AuthError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
        AuthError::Hashing(message) => HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process credentials",
            message,
        )
        .into_response(),
        AuthError::Invalid(errors) => HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid form",
            errors.to_string(),
        )
        .into_response(),
    }
}
