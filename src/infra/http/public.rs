use std::io::ErrorKind;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, RawQuery, State},
    http::{
        HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::error::HttpError,
    cache::response_cache_layer,
    infra::uploads::MediaStorageError,
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, GroupTemplate, IndexTemplate, LayoutChrome,
        LayoutContext, PostDetailTemplate, ProfileTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState, auth, authoring, db_health_response, feed_error_response, follows,
    middleware::{log_responses, set_request_context},
    session::{CurrentUser, load_session},
};

pub fn build_router(state: HttpState) -> Router {
    // Only the front page is cached; the layer reads the viewer set by `load_session`.
    let cached_routes = Router::new()
        .route("/", get(index))
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            response_cache_layer,
        ));

    let form_routes = Router::new()
        .route(
            "/create/",
            get(authoring::create_form).post(authoring::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(authoring::edit_form).post(authoring::edit_submit),
        )
        .layer(DefaultBodyLimit::max(state.max_request_bytes));

    Router::new()
        .merge(cached_routes)
        .merge(form_routes)
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", post(follows::follow))
        .route("/profile/{username}/unfollow/", post(follows::unfollow))
        .route("/follow/", get(follows::follow_index))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/comment/", post(authoring::add_comment))
        .route("/posts/{id}/delete/", post(authoring::delete_post))
        .route(
            "/auth/signup/",
            get(auth::signup_form).post(auth::signup_submit),
        )
        .route(
            "/auth/login/",
            get(auth::login_form).post(auth::login_submit),
        )
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(db_health))
        .fallback(not_found)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, load_session))
        .layer(middleware::from_fn(set_request_context))
}

/// First `page` value from the raw query string.
pub(super) fn page_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
}

/// Post ids in paths are positive integers; anything else is an unknown page.
pub(super) fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

async fn index(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), "/").with_title("Latest updates");
    let page = page_param(query.as_deref());

    match state.feed.index(page.as_deref()).await {
        Ok(content) => render_template_response(
            IndexTemplate {
                view: LayoutContext::new(chrome, content),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_response(err, chrome),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), uri.path());
    let page = page_param(query.as_deref());

    match state.feed.group(&slug, page.as_deref()).await {
        Ok(content) => {
            let chrome = chrome.with_title(&content.title);
            render_template_response(
                GroupTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, chrome),
    }
}

async fn profile(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path(username): Path<String>,
    RawQuery(query): RawQuery,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), uri.path());
    let page = page_param(query.as_deref());

    match state
        .feed
        .profile(&username, page.as_deref(), viewer.user())
        .await
    {
        Ok(content) => {
            let chrome = chrome.with_title(format!("Profile of {}", content.display_name));
            render_template_response(
                ProfileTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, chrome),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), uri.path());
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, "post id is not a number");
    };

    match state.feed.post_detail(id, viewer.user()).await {
        Ok(content) => {
            let chrome = chrome.with_title(format!("Post {}", content.title));
            render_template_response(
                PostDetailTemplate {
                    view: LayoutContext::new(chrome, content),
                },
                StatusCode::OK,
            )
        }
        Err(err) => feed_error_response(err, chrome),
    }
}

async fn about_author(viewer: CurrentUser) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), "/about/author/").with_title("About the author");
    render_template_response(
        AboutAuthorTemplate {
            view: LayoutContext::new(chrome, ()),
        },
        StatusCode::OK,
    )
}

async fn about_tech(viewer: CurrentUser) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), "/about/tech/").with_title("Technologies");
    render_template_response(
        AboutTechTemplate {
            view: LayoutContext::new(chrome, ()),
        },
        StatusCode::OK,
    )
}

async fn not_found(viewer: CurrentUser, uri: Uri) -> Response {
    let chrome = LayoutChrome::new(viewer.user(), uri.path());
    render_not_found_response(chrome, &format!("no route for {}", uri.path()))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.health_check().await)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested path escapes the media root",
        )
        .into_response(),
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
                &err,
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    // stored names carry a random identifier and are never rewritten
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_param_takes_first_value() {
        assert_eq!(page_param(None), None);
        assert_eq!(page_param(Some("")), None);
        assert_eq!(page_param(Some("page=2")), Some("2".to_string()));
        assert_eq!(
            page_param(Some("x=1&page=abc&page=3")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn post_ids_must_be_positive_integers() {
        assert_eq!(parse_post_id("12"), Some(12));
        assert_eq!(parse_post_id("0"), None);
        assert_eq!(parse_post_id("-3"), None);
        assert_eq!(parse_post_id("abc"), None);
    }

    #[test]
    fn media_response_guesses_content_type() {
        let response = build_media_response("posts/2026/01/01/x-cat.png", Bytes::from_static(b"png"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[CONTENT_LENGTH], "3");
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }
}
