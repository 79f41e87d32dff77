use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("`{follower}` does not follow `{author}`")]
    NotFollowing { follower: String, author: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is ignored.
    SelfFollow,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.author(author_username).await?;
        if author.id == follower.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = self.follows.follow(follower.id, author.id).await?;
        if !created {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        info!(
            target = "yatube::application::follows",
            follower = %follower.username,
            author = %author.username,
            "follow created"
        );
        Ok(FollowOutcome::Created)
    }

    pub async fn unfollow(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<(), FollowError> {
        let author = self.author(author_username).await?;
        if !self.follows.unfollow(follower.id, author.id).await? {
            return Err(FollowError::NotFollowing {
                follower: follower.username.clone(),
                author: author.username,
            });
        }

        info!(
            target = "yatube::application::follows",
            follower = %follower.username,
            author = %author.username,
            "follow removed"
        );
        Ok(())
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
