//! In-memory repositories and request helpers shared by the HTTP tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;
use yatube::{
    application::{
        auth::AuthService,
        feed::FeedService,
        follows::FollowService,
        pagination::PageWindow,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupWithCount, GroupsRepo,
            HealthRepo, PostListScope, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
            UpdatePostParams, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    domain::entities::{
        CommentRecord, GroupRecord, GroupRef, PostRecord, SessionRecord, UserRecord,
        display_name,
    },
    infra::{
        http::{HttpState, SESSION_COOKIE, build_router},
        uploads::MediaStorage,
    },
};

/// A 2x1 GIF, small enough to inline and valid enough for `imagesize`.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    clock: i64,
    users: Vec<UserRecord>,
    sessions: Vec<SessionRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing timestamps keep "newest first" deterministic.
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.clock)
    }

    fn user(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.id == id)
    }

    fn post_record(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let author = self.user(post.author_id).ok_or(RepoError::NotFound)?;
        let group = post.group_id.and_then(|id| {
            self.groups.iter().find(|g| g.id == id).map(|g| GroupRef {
                id: g.id,
                slug: g.slug.clone(),
                title: g.title.clone(),
            })
        });
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            author_id: author.id,
            author_username: author.username.clone(),
            author_display_name: display_name(
                &author.first_name,
                &author.last_name,
                &author.username,
            ),
            group,
            image: post.image.clone(),
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(id) => post.group_id == Some(id),
            PostListScope::Author(id) => post.author_id == id,
            PostListScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|(follower, author)| *follower == user_id && *author == post.author_id),
        }
    }

    fn scoped_newest_first(&self, scope: PostListScope) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self
            .posts
            .iter()
            .filter(|post| self.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// Repository implementation backed by vectors, applying the same cascade
/// rules as the database schema.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock")
    }

    pub fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn post_group(&self, id: i64) -> Option<i64> {
        self.lock()
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| post.group_id)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".into(),
            });
        }
        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            password_hash: params.password_hash,
            created_at: state.tick(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().user(id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.lock();
        let session = SessionRecord {
            id: params.id,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|s| s.prefix == prefix)
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.lock().sessions.retain(|s| s.id != id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn list_groups_with_counts(&self) -> Result<Vec<GroupWithCount>, RepoError> {
        let state = self.lock();
        let mut groups: Vec<GroupWithCount> = state
            .groups
            .iter()
            .map(|group| GroupWithCount {
                group: group.clone(),
                post_count: state
                    .posts
                    .iter()
                    .filter(|p| p.group_id == Some(group.id))
                    .count() as u64,
            })
            .collect();
        groups.sort_by(|a, b| a.group.title.cmp(&b.group.title));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.lock().groups.iter().find(|g| g.id == id).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.lock();
        if state.groups.iter().any(|g| g.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "post_groups_slug_key".into(),
            });
        }
        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        let before = state.groups.len();
        state.groups.retain(|g| g.id != id);
        if state.groups.len() == before {
            return Err(RepoError::NotFound);
        }
        for post in state.posts.iter_mut().filter(|p| p.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        Ok(self.lock().scoped_newest_first(scope).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.lock();
        state
            .scoped_newest_first(scope)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| state.post_record(post))
            .collect()
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.lock();
        state
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|post| state.post_record(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = StoredPost {
            id: state.next_id(),
            text: params.text,
            created_at: state.tick(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.push(post.clone());
        state.post_record(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.lock();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        state.post_record(&post)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.lock();
        let before = state.posts.len();
        state.posts.retain(|p| p.id != id);
        if state.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        state.comments.retain(|c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .lock()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn create_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let mut state = self.lock();
        if !state.posts.iter().any(|p| p.id == params.post_id) {
            return Err(RepoError::NotFound);
        }
        let author_username = state
            .user(params.author_id)
            .map(|u| u.username.clone())
            .ok_or(RepoError::NotFound)?;
        let comment = CommentRecord {
            id: state.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            author_username,
            text: params.text,
            created_at: state.tick(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.lock();
        if state.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        state.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.lock();
        let before = state.follows.len();
        state.follows.retain(|edge| *edge != (user_id, author_id));
        Ok(state.follows.len() != before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user_id, author_id)))
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|(_, author)| *author == author_id)
            .count() as u64)
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A router wired to a fresh [`MemoryStore`] and a temporary media root.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    _media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub fn with_cache(config: CacheConfig) -> Self {
        let media_dir = tempfile::tempdir().expect("media tempdir");
        let store = Arc::new(MemoryStore::default());
        let media = Arc::new(
            MediaStorage::new(media_dir.path().to_path_buf()).expect("media storage"),
        );

        let posts: Arc<dyn PostsRepo> = store.clone();
        let writes: Arc<dyn PostsWriteRepo> = store.clone();
        let groups: Arc<dyn GroupsRepo> = store.clone();
        let users: Arc<dyn UsersRepo> = store.clone();
        let sessions: Arc<dyn SessionsRepo> = store.clone();
        let follows: Arc<dyn FollowsRepo> = store.clone();
        let comments: Arc<dyn CommentsRepo> = store.clone();
        let health: Arc<dyn HealthRepo> = store.clone();

        let state = HttpState {
            feed: Arc::new(FeedService::new(
                posts.clone(),
                groups.clone(),
                users.clone(),
                follows.clone(),
                comments.clone(),
            )),
            posts: Arc::new(PostService::new(
                posts,
                writes,
                groups,
                comments,
                media.clone(),
            )),
            follows: Arc::new(FollowService::new(users.clone(), follows)),
            auth: Arc::new(AuthService::new(users, sessions, Duration::days(14))),
            media,
            health,
            cache: CacheState::new(config),
            cookie_secure: false,
            max_request_bytes: 1024 * 1024,
        };

        Self {
            router: build_router(state.clone()),
            store,
            state,
            _media: media_dir,
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.store
            .create_user(CreateUserParams {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                password_hash: String::new(),
            })
            .await
            .expect("create user")
    }

    /// Create a user and return the `Cookie` header value of a live session.
    pub async fn sign_in(&self, username: &str) -> (UserRecord, String) {
        let user = self.user(username).await;
        let session = self
            .state
            .auth
            .open_session(user.clone())
            .await
            .expect("open session");
        (user, format!("{SESSION_COOKIE}={}", session.token))
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.store
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("About {title}"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        self.store
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|g| g.id),
                image: None,
            })
            .await
            .expect("create post")
    }

    pub async fn comment(&self, author: &UserRecord, post: &PostRecord, text: &str) {
        self.store
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .expect("create comment");
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        form: MultipartBody,
    ) -> Response<Body> {
        let (content_type, body) = form.finish();
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).expect("request"))
            .await
    }
}

/// Minimal `multipart/form-data` encoder for the post form.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("yatube-test-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}
