//! Post and comment submission handlers. All of them require a signed-in user.

use axum::{
    Form,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;
use tracing::warn;

use crate::{
    application::{
        error::HttpError,
        forms::{CommentInput, FormErrors, ImageUpload, PostInput},
        posts::{AuthorAction, AuthoringError},
    },
    domain::entities::{GroupRecord, PostRecord},
    presentation::views::{
        CommentFormView, LayoutChrome, LayoutContext, PostDetailTemplate, PostFormContext,
        PostFormTemplate, post_href, profile_href, render_not_found_response,
        render_template_response,
    },
};

use super::{
    HttpState, authoring_error_response, feed_error_response, public::parse_post_id,
    session::RequireUser,
};

const SOURCE: &str = "infra::http::authoring";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), "/create/").with_title("New post");
    match state.posts.groups().await {
        Ok(groups) => render_post_form(
            chrome,
            PostFormContext::create(&groups, &PostInput::default(), &FormErrors::default()),
        ),
        Err(err) => authoring_error_response(err, chrome),
    }
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), "/create/").with_title("New post");
    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return multipart_error_response(err),
    };

    match state.posts.create_post(&user, &input).await {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(AuthoringError::Invalid(errors)) => {
            let groups = match state.posts.groups().await {
                Ok(groups) => groups,
                Err(err) => return authoring_error_response(err, chrome),
            };
            render_post_form(chrome, PostFormContext::create(&groups, &input, &errors))
        }
        Err(err) => authoring_error_response(err, chrome),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path()).with_title("Edit post");
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, "post id is not a number");
    };

    let post = match state.posts.edit_access(&user, post_id).await {
        Ok(AuthorAction::Done(post)) => post,
        Ok(AuthorAction::NotAuthor(post)) => return redirect_to_post(&post),
        Err(err) => return authoring_error_response(err, chrome),
    };

    match state.posts.groups().await {
        Ok(groups) => render_edit_form(
            chrome,
            &post,
            &groups,
            &PostFormContext::input_from_post(&post),
            &FormErrors::default(),
        ),
        Err(err) => authoring_error_response(err, chrome),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    mut multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path()).with_title("Edit post");
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, "post id is not a number");
    };
    let input = match read_post_form(&mut multipart).await {
        Ok(input) => input,
        Err(err) => return multipart_error_response(err),
    };

    match state.posts.update_post(&user, post_id, &input).await {
        Ok(AuthorAction::Done(post)) | Ok(AuthorAction::NotAuthor(post)) => {
            redirect_to_post(&post)
        }
        Err(AuthoringError::Invalid(errors)) => {
            let post = match state.feed.find_post(post_id).await {
                Ok(post) => post,
                Err(err) => return feed_error_response(err, chrome),
            };
            match state.posts.groups().await {
                Ok(groups) => render_edit_form(chrome, &post, &groups, &input, &errors),
                Err(err) => authoring_error_response(err, chrome),
            }
        }
        Err(err) => authoring_error_response(err, chrome),
    }
}

pub(super) async fn delete_post(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, "post id is not a number");
    };

    match state.posts.delete_post(&user, post_id).await {
        Ok(AuthorAction::Done(_)) => Redirect::to(&profile_href(&user.username)).into_response(),
        Ok(AuthorAction::NotAuthor(post)) => redirect_to_post(&post),
        Err(err) => authoring_error_response(err, chrome),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(user): RequireUser,
    Path(raw_id): Path<String>,
    uri: Uri,
    Form(input): Form<CommentInput>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user), uri.path());
    let Some(post_id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome, "post id is not a number");
    };

    match state.posts.add_comment(&user, post_id, &input).await {
        Ok(comment) => Redirect::to(&post_href(comment.post_id)).into_response(),
        Err(AuthoringError::Invalid(errors)) => {
            // the post page is shown again with the rejected comment in place
            match state.feed.post_detail(post_id, Some(&user)).await {
                Ok(mut content) => {
                    content.comment_form =
                        CommentFormView::with_errors(post_id, &input.text, &errors);
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
        Err(err) => authoring_error_response(err, chrome),
    }
}

fn redirect_to_post(post: &PostRecord) -> Response {
    Redirect::to(&post_href(post.id)).into_response()
}

fn render_post_form(chrome: LayoutChrome, content: PostFormContext) -> Response {
    render_template_response(
        PostFormTemplate {
            view: LayoutContext::new(chrome, content),
        },
        StatusCode::OK,
    )
}

fn render_edit_form(
    chrome: LayoutChrome,
    post: &PostRecord,
    groups: &[GroupRecord],
    input: &PostInput,
    errors: &FormErrors,
) -> Response {
    render_post_form(chrome, PostFormContext::edit(post, groups, input, errors))
}

/// Collect the post form fields. A file part without a name or bytes counts as no upload.
async fn read_post_form(multipart: &mut Multipart) -> Result<PostInput, MultipartError> {
    let mut input = PostInput::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("text") => input.text = field.text().await?,
            Some("group") => input.group = field.text().await?,
            Some("clear_image") => {
                let value = field.text().await?;
                input.clear_image = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "on" | "true" | "1" | "yes"
                );
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default();
                let data = field.bytes().await?;
                if !filename.is_empty() && !data.is_empty() {
                    input.image = Some(ImageUpload { filename, data });
                }
            }
            _ => continue,
        }
    }

    Ok(input)
}

fn multipart_error_response(err: MultipartError) -> Response {
    let status = err.status();
    warn!(
        target = SOURCE,
        status = status.as_u16(),
        error = %err,
        "failed to read post form"
    );
    let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Upload is too large"
    } else {
        "Invalid form data"
    };
    HttpError::from_error(SOURCE, status, public_message, &err).into_response()
}
