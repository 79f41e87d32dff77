use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::{FormErrors, PostInput, SignupInput};
use crate::application::pagination::{Page, PageWindow};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{TITLE_CHARS, preview};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

pub const SITE_TITLE: &str = "Yatube";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the generic 404 page. `detail` ends up in the response log only.
pub fn render_not_found_response(chrome: LayoutChrome, detail: &str) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Page not found"), content);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
    pub profile_href: String,
}

#[derive(Clone, Debug)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone, Debug)]
pub struct LayoutChrome {
    pub site_title: String,
    pub page_title: String,
    pub viewer: Option<ViewerView>,
    pub navigation: Vec<NavigationLinkView>,
    pub year: i32,
}

impl LayoutChrome {
    /// Header and footer for the given viewer; `current_path` marks the active link.
    pub fn new(viewer: Option<&UserRecord>, current_path: &str) -> Self {
        let mut links: Vec<(&str, String)> = vec![
            ("About the author", "/about/author/".to_string()),
            ("Technologies", "/about/tech/".to_string()),
        ];
        match viewer {
            Some(_) => {
                links.push(("New post", "/create/".to_string()));
                links.push(("Following", "/follow/".to_string()));
            }
            None => {
                links.push(("Log in", "/auth/login/".to_string()));
                links.push(("Sign up", "/auth/signup/".to_string()));
            }
        }

        let navigation = links
            .into_iter()
            .map(|(label, href)| NavigationLinkView {
                is_active: href == current_path,
                label: label.to_string(),
                href,
            })
            .collect();

        Self {
            site_title: SITE_TITLE.to_string(),
            page_title: SITE_TITLE.to_string(),
            viewer: viewer.map(|user| ViewerView {
                username: user.username.clone(),
                display_name: user.display_name(),
                profile_href: profile_href(&user.username),
            }),
            navigation,
            year: OffsetDateTime::now_utc().year(),
        }
    }

    pub fn with_title(self, title: impl AsRef<str>) -> Self {
        Self {
            page_title: format!("{} | {}", title.as_ref(), self.site_title),
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutContext<T> {
    pub chrome: LayoutChrome,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self { chrome, content }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_display_name: String,
    pub author_href: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl PostCard {
    pub fn from_record(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            author_username: post.author_username.clone(),
            author_display_name: post.author_display_name.clone(),
            author_href: profile_href(&post.author_username),
            published: format_date(post.created_at),
            iso_date: format_iso(post.created_at),
            group: post.group.as_ref().map(|group| GroupBadge {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            detail_href: post_href(post.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLinkView {
    pub number: u64,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone, Debug)]
pub struct PaginationView {
    pub is_paginated: bool,
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

impl PaginationView {
    pub fn new(base_path: &str, window: &PageWindow) -> Self {
        let href = |number: u64| format!("{base_path}?page={number}");
        Self {
            is_paginated: window.num_pages > 1,
            number: window.number,
            num_pages: window.num_pages,
            previous_href: (window.number > 1).then(|| href(window.number - 1)),
            next_href: (window.number < window.num_pages).then(|| href(window.number + 1)),
            pages: (1..=window.num_pages)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == window.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListingView {
    pub posts: Vec<PostCard>,
    pub total: u64,
    pub pagination: PaginationView,
}

impl ListingView {
    pub fn from_page(base_path: &str, page: Page<PostRecord>) -> Self {
        let pagination = PaginationView::new(base_path, &page.window);
        Self {
            posts: page.items.iter().map(PostCard::from_record).collect(),
            total: page.window.total,
            pagination,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct IndexContext {
    pub listing: ListingView,
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContext>,
}

#[derive(Clone, Debug)]
pub struct GroupContext {
    pub title: String,
    pub description: String,
    pub listing: ListingView,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

#[derive(Clone, Debug)]
pub struct ProfileContext {
    pub username: String,
    pub display_name: String,
    pub post_count: u64,
    pub follower_count: u64,
    /// Viewer is signed in and is not the author.
    pub show_follow_controls: bool,
    pub following: bool,
    pub follow_action: String,
    pub unfollow_action: String,
    pub listing: ListingView,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Clone, Debug)]
pub struct FollowContext {
    pub listing: ListingView,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContext>,
}

// ---------------------------------------------------------------------------
// Post detail
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub created: String,
    pub iso_date: String,
}

impl CommentView {
    pub fn from_record(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            author_href: profile_href(&comment.author_username),
            text: comment.text.clone(),
            created: format_date(comment.created_at),
            iso_date: format_iso(comment.created_at),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
}

impl CommentFormView {
    pub fn empty(post_id: i64) -> Self {
        Self {
            action: format!("/posts/{post_id}/comment/"),
            text: String::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(post_id: i64, text: &str, errors: &FormErrors) -> Self {
        Self {
            text: text.to_string(),
            errors: errors.field("text").to_vec(),
            ..Self::empty(post_id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct PostDetailContext {
    pub title: String,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub edit_href: String,
    pub delete_action: String,
    pub can_comment: bool,
    pub login_href: String,
    pub comment_form: CommentFormView,
}

impl PostDetailContext {
    pub fn new(
        post: &PostRecord,
        author_post_count: u64,
        comments: &[CommentRecord],
        viewer: Option<&UserRecord>,
    ) -> Self {
        let detail_href = post_href(post.id);
        Self {
            title: preview(&post.text, TITLE_CHARS).to_string(),
            post: PostCard::from_record(post),
            author_post_count,
            comments: comments.iter().map(CommentView::from_record).collect(),
            can_edit: viewer.is_some_and(|user| user.id == post.author_id),
            edit_href: format!("/posts/{}/edit/", post.id),
            delete_action: format!("/posts/{}/delete/", post.id),
            can_comment: viewer.is_some(),
            login_href: login_href(&detail_href),
            comment_form: CommentFormView::empty(post.id),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

// ---------------------------------------------------------------------------
// Post form
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupOptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Clone, Debug)]
pub struct PostFormContext {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub group_options: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl PostFormContext {
    pub fn create(groups: &[GroupRecord], input: &PostInput, errors: &FormErrors) -> Self {
        Self::build(false, "/create/".to_string(), groups, input, None, errors)
    }

    pub fn edit(
        post: &PostRecord,
        groups: &[GroupRecord],
        input: &PostInput,
        errors: &FormErrors,
    ) -> Self {
        Self::build(
            true,
            format!("/posts/{}/edit/", post.id),
            groups,
            input,
            post.image.as_deref().map(media_href),
            errors,
        )
    }

    /// Form input pre-filled from a stored post.
    pub fn input_from_post(post: &PostRecord) -> PostInput {
        PostInput {
            text: post.text.clone(),
            group: post
                .group
                .as_ref()
                .map(|group| group.id.to_string())
                .unwrap_or_default(),
            image: None,
            clear_image: false,
        }
    }

    fn build(
        is_edit: bool,
        action: String,
        groups: &[GroupRecord],
        input: &PostInput,
        current_image: Option<String>,
        errors: &FormErrors,
    ) -> Self {
        let selected = input.group.trim();
        let mut group_options = vec![GroupOptionView {
            value: String::new(),
            label: "---------".to_string(),
            selected: selected.is_empty(),
        }];
        group_options.extend(groups.iter().map(|group| {
            let value = group.id.to_string();
            GroupOptionView {
                selected: value == selected,
                value,
                label: group.title.clone(),
            }
        }));

        Self {
            is_edit,
            action,
            text: input.text.clone(),
            group_options,
            current_image,
            text_errors: errors.field("text").to_vec(),
            group_errors: errors.field("group").to_vec(),
            image_errors: errors.field("image").to_vec(),
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub input_type: String,
    pub value: String,
    pub errors: Vec<String>,
}

impl FieldView {
    fn new(name: &str, label: &str, input_type: &str, value: &str, errors: &FormErrors) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            input_type: input_type.to_string(),
            value: value.to_string(),
            errors: errors.field(name).to_vec(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountFormContext {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub next: String,
    pub fields: Vec<FieldView>,
    pub non_field_errors: Vec<String>,
}

impl AccountFormContext {
    pub fn login(username: &str, next: &str, errors: &FormErrors) -> Self {
        Self {
            heading: "Log in".to_string(),
            action: "/auth/login/".to_string(),
            submit_label: "Log in".to_string(),
            next: next.to_string(),
            fields: vec![
                FieldView::new("username", "Username", "text", username, errors),
                FieldView::new("password", "Password", "password", "", errors),
            ],
            non_field_errors: errors.non_field().to_vec(),
        }
    }

    pub fn signup(input: &SignupInput, errors: &FormErrors) -> Self {
        Self {
            heading: "Sign up".to_string(),
            action: "/auth/signup/".to_string(),
            submit_label: "Sign up".to_string(),
            next: String::new(),
            fields: vec![
                FieldView::new("first_name", "First name", "text", &input.first_name, errors),
                FieldView::new("last_name", "Last name", "text", &input.last_name, errors),
                FieldView::new("username", "Username", "text", &input.username, errors),
                FieldView::new("email", "Email address", "email", &input.email, errors),
                FieldView::new("password1", "Password", "password", "", errors),
                FieldView::new("password2", "Password confirmation", "password", "", errors),
            ],
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

#[derive(Template)]
#[template(path = "users/account_form.html")]
pub struct AccountFormTemplate {
    pub view: LayoutContext<AccountFormContext>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

// ---------------------------------------------------------------------------
// Static pages
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub home_href: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            home_href: "/".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

// ---------------------------------------------------------------------------
// URL and date helpers
// ---------------------------------------------------------------------------

pub fn profile_href(username: &str) -> String {
    format!("/profile/{}/", encode_segment(username))
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn media_href(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

/// Login URL that returns to `next` afterwards. `/` stays unescaped.
pub fn login_href(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded.replace("%2F", "/"))
}

fn encode_segment(segment: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(segment.as_bytes()).collect();
    // form encoding turns spaces into `+`, which a path segment would keep literally
    encoded.replace('+', "%20")
}

pub fn format_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!(
            "[day padding:none] [month repr:long] [year]"
        ))
        .unwrap_or_default()
}

pub fn format_iso(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}
