//! Signup, login and logout pages.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::{
    application::{
        auth::AuthError,
        forms::{FormErrors, LoginInput, SignupInput},
    },
    presentation::views::{
        AccountFormContext, AccountFormTemplate, LayoutChrome, LayoutContext, LoggedOutTemplate,
        render_template_response,
    },
};

use super::{
    HttpState, auth_error_response,
    session::{CurrentUser, SESSION_COOKIE, expired_session_cookie, safe_next, session_cookie},
};

#[derive(Debug, Default, Deserialize)]
pub(super) struct NextQuery {
    #[serde(default)]
    next: String,
}

pub(super) async fn signup_form(viewer: CurrentUser) -> Response {
    render_account_form(
        LayoutChrome::new(viewer.user(), "/auth/signup/").with_title("Sign up"),
        AccountFormContext::signup(&SignupInput::default(), &FormErrors::default()),
    )
}

pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    jar: CookieJar,
    Form(input): Form<SignupInput>,
) -> Response {
    match state.auth.signup(&input).await {
        Ok(session) => (
            jar.add(session_cookie(&session, state.cookie_secure)),
            Redirect::to("/"),
        )
            .into_response(),
        Err(AuthError::Invalid(errors)) => render_account_form(
            LayoutChrome::new(viewer.user(), "/auth/signup/").with_title("Sign up"),
            AccountFormContext::signup(&input, &errors),
        ),
        Err(err) => auth_error_response(err),
    }
}

pub(super) async fn login_form(viewer: CurrentUser, Query(query): Query<NextQuery>) -> Response {
    render_account_form(
        LayoutChrome::new(viewer.user(), "/auth/login/").with_title("Log in"),
        AccountFormContext::login("", &query.next, &FormErrors::default()),
    )
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    viewer: CurrentUser,
    jar: CookieJar,
    Form(input): Form<LoginInput>,
) -> Response {
    match state.auth.login(&input).await {
        Ok(session) => (
            jar.add(session_cookie(&session, state.cookie_secure)),
            Redirect::to(safe_next(&input.next)),
        )
            .into_response(),
        Err(AuthError::Invalid(errors)) => render_account_form(
            LayoutChrome::new(viewer.user(), "/auth/login/").with_title("Log in"),
            AccountFormContext::login(input.username.trim(), &input.next, &errors),
        ),
        Err(err) => auth_error_response(err),
    }
}

/// End the session and show the goodbye page to an anonymous layout.
pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.auth.logout(cookie.value()).await
    {
        return auth_error_response(AuthError::Repo(err));
    }

    let chrome = LayoutChrome::new(None, "/auth/logout/").with_title("Logged out");
    let page = render_template_response(
        LoggedOutTemplate {
            view: LayoutContext::new(chrome, ()),
        },
        StatusCode::OK,
    );
    (jar.add(expired_session_cookie()), page).into_response()
}

fn render_account_form(chrome: LayoutChrome, content: AccountFormContext) -> Response {
    render_template_response(
        AccountFormTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}
