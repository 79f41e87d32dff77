use axum::{
    extract::{Path, RawQuery, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};

use crate::presentation::views::{
    FollowTemplate, LayoutChrome, LayoutContext, profile_href, render_template_response,
};

use super::{
    HttpState, feed_error_response, follow_error_response, public::page_param,
    session::RequireUser,
};

pub(super) async fn follow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_response(err, LayoutChrome::new(Some(&user), uri.path())),
    }
}

pub(super) async fn unfollow(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
    uri: Uri,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(()) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_response(err, LayoutChrome::new(Some(&user), uri.path())),
    }
}

/// Posts by the authors the viewer follows.
pub(super) async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), "/follow/").with_title("Following");
    let page = page_param(query.as_deref());

    match state.feed.follow_feed(&user, page.as_deref()).await {
        Ok(content) => render_template_response(
            FollowTemplate {
                view: LayoutContext::new(chrome, content),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_response(err, chrome),
    }
}
