mod support;

use axum::http::{StatusCode, header};
use support::{TestApp, body_string, location};
use yatube::{application::forms::SignupInput, infra::http::SESSION_COOKIE};

fn session_cookie(response: &axum::http::Response<axum::body::Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{SESSION_COOKIE}=")))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

async fn register(app: &TestApp, username: &str, password: &str) {
    app.state
        .auth
        .register(&SignupInput {
            username: username.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
            ..Default::default()
        })
        .await
        .expect("register user");
}

#[tokio::test]
async fn signup_signs_the_user_in() {
    let app = TestApp::new();

    let response = app.get("/auth/signup/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = "first_name=Leo&last_name=Tolstoy&username=leo&email=leo%40example.com\
                &password1=war-and-peace&password2=war-and-peace";
    let response = app.post_form("/auth/signup/", None, body).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response).expect("session cookie");

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(app.get("/profile/leo/", None).await).await;
    assert!(html.contains("Leo Tolstoy"));
}

#[tokio::test]
async fn signup_errors_are_shown() {
    let app = TestApp::new();
    register(&app, "leo", "war-and-peace").await;

    let body = "username=leo&password1=war-and-peace&password2=anna-karenina";
    let response = app.post_form("/auth/signup/", None, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    let html = body_string(response).await;
    assert!(html.contains("match"));
}

#[tokio::test]
async fn login_redirects_to_next() {
    let app = TestApp::new();
    register(&app, "leo", "war-and-peace").await;

    let response = app.get("/auth/login/?next=/follow/", None).await;
    let html = body_string(response).await;
    assert!(html.contains("name=\"next\""));

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=war-and-peace&next=%2Ffollow%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/follow/");
    let cookie = session_cookie(&response).expect("session cookie");

    let response = app.get("/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_ignores_foreign_next() {
    let app = TestApp::new();
    register(&app, "leo", "war-and-peace").await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=leo&password=war-and-peace&next=%2F%2Fevil.example%2F",
        )
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn wrong_password_sets_no_cookie() {
    let app = TestApp::new();
    register(&app, "leo", "war-and-peace").await;

    let response = app
        .post_form("/auth/login/", None, "username=leo&password=nope-nope")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert!(body_string(response).await.contains("Please enter a correct username and password"));
    assert_eq!(app.store.session_count(), 0);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in("leo").await;
    assert_eq!(app.store.session_count(), 1);

    let response = app.post_form("/auth/logout/", Some(&cookie), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = session_cookie(&response).expect("cleared cookie");
    assert_eq!(cleared, format!("{SESSION_COOKIE}="));
    let html = body_string(response).await;
    assert!(html.contains("You have logged out"));
    assert!(!html.contains("Log out</button>"));
    assert_eq!(app.store.session_count(), 0);

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn tampered_session_is_anonymous() {
    let app = TestApp::new();
    let (_, cookie) = app.sign_in("leo").await;
    let tampered = format!("{}x", cookie.trim_end_matches(|c: char| c != '_'));

    let response = app.get("/create/", Some(&tampered)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
