//! Write side for posts and comments.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::forms::{CommentInput, FormErrors, PostInput};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{PREVIEW_CHARS, preview};
use crate::infra::uploads::{MediaStorage, MediaStorageError};

const TARGET: &str = "yatube::application::posts";

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("post {0} not found")]
    UnknownPost(i64),
    #[error("invalid input: {0}")]
    Invalid(FormErrors),
    #[error("failed to store image: {0}")]
    Media(#[from] MediaStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Outcome of an author-only action. Other users are bounced to the post.
#[derive(Debug)]
pub enum AuthorAction<T> {
    Done(T),
    NotAuthor(PostRecord),
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writes: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<MediaStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writes: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<MediaStorage>,
    ) -> Self {
        Self {
            posts,
            writes,
            groups,
            comments,
            media,
        }
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, AuthoringError> {
        Ok(self.groups.list_groups().await?)
    }

    /// Validate and persist a new post authored by `author`.
    pub async fn create_post(
        &self,
        author: &UserRecord,
        input: &PostInput,
    ) -> Result<PostRecord, AuthoringError> {
        let groups = self.groups.list_groups().await?;
        let valid = input.validate(&groups).map_err(AuthoringError::Invalid)?;

        let image = match valid.image.as_ref() {
            Some(upload) => Some(
                self.media
                    .store_post_image(&upload.filename, &upload.data)
                    .await?,
            ),
            None => None,
        };

        let result = self
            .writes
            .create_post(CreatePostParams {
                author_id: author.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.clone(),
            })
            .await;

        match result {
            Ok(post) => {
                info!(
                    target = TARGET,
                    post_id = post.id,
                    author = %author.username,
                    preview = preview(&post.text, PREVIEW_CHARS),
                    "post created"
                );
                Ok(post)
            }
            Err(err) => {
                if let Some(path) = image.as_deref() {
                    self.discard_image(path).await;
                }
                Err(err.into())
            }
        }
    }

    /// Load a post for editing by `editor`.
    pub async fn edit_access(
        &self,
        editor: &UserRecord,
        post_id: i64,
    ) -> Result<AuthorAction<PostRecord>, AuthoringError> {
        let post = self.load(post_id).await?;
        if post.author_id != editor.id {
            return Ok(AuthorAction::NotAuthor(post));
        }
        Ok(AuthorAction::Done(post))
    }

    /// Apply an edit. Non-authors never reach validation or persistence.
    pub async fn update_post(
        &self,
        editor: &UserRecord,
        post_id: i64,
        input: &PostInput,
    ) -> Result<AuthorAction<PostRecord>, AuthoringError> {
        let post = match self.edit_access(editor, post_id).await? {
            AuthorAction::Done(post) => post,
            denied @ AuthorAction::NotAuthor(_) => return Ok(denied),
        };

        let groups = self.groups.list_groups().await?;
        let valid = input.validate(&groups).map_err(AuthoringError::Invalid)?;

        let (image, replaced) = match (valid.image.as_ref(), valid.clear_image) {
            (Some(upload), _) => {
                let stored = self
                    .media
                    .store_post_image(&upload.filename, &upload.data)
                    .await?;
                (Some(stored), post.image.clone())
            }
            (None, true) => (None, post.image.clone()),
            (None, false) => (post.image.clone(), None),
        };

        let uploaded = valid.image.is_some();
        let result = self
            .writes
            .update_post(UpdatePostParams {
                id: post.id,
                text: valid.text,
                group_id: valid.group_id,
                image: image.clone(),
            })
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(err) => {
                if uploaded && let Some(path) = image.as_deref() {
                    self.discard_image(path).await;
                }
                return Err(err.into());
            }
        };

        if let Some(old) = replaced.as_deref()
            && updated.image.as_deref() != Some(old)
        {
            self.discard_image(old).await;
        }

        info!(
            target = TARGET,
            post_id = updated.id,
            editor = %editor.username,
            "post updated"
        );
        Ok(AuthorAction::Done(updated))
    }

    /// Delete a post together with its comments and stored image.
    pub async fn delete_post(
        &self,
        actor: &UserRecord,
        post_id: i64,
    ) -> Result<AuthorAction<PostRecord>, AuthoringError> {
        let post = match self.edit_access(actor, post_id).await? {
            AuthorAction::Done(post) => post,
            denied @ AuthorAction::NotAuthor(_) => return Ok(denied),
        };

        self.writes.delete_post(post.id).await?;
        if let Some(path) = post.image.as_deref() {
            self.discard_image(path).await;
        }

        info!(
            target = TARGET,
            post_id = post.id,
            author = %actor.username,
            "post deleted"
        );
        Ok(AuthorAction::Done(post))
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: i64,
        input: &CommentInput,
    ) -> Result<CommentRecord, AuthoringError> {
        let post = self.load(post_id).await?;
        let text = input.validate().map_err(AuthoringError::Invalid)?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = TARGET,
            post_id = post.id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }

    async fn load(&self, post_id: i64) -> Result<PostRecord, AuthoringError> {
        self.posts
            .find_post_by_id(post_id)
            .await?
            .ok_or(AuthoringError::UnknownPost(post_id))
    }

    async fn discard_image(&self, path: &str) {
        if let Err(err) = self.media.delete(path).await {
            warn!(
                target = TARGET,
                path = %path,
                error = %err,
                "failed to remove stored image"
            );
        }
    }
}
