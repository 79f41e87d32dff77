//! Group administration used by the command-line interface.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupWithCount, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title must be between 1 and {MAX_TITLE_LEN} characters")]
    InvalidTitle,
    #[error("invalid slug: {0}")]
    InvalidSlug(#[from] SlugError),
    #[error("a group with slug `{0}` already exists")]
    DuplicateSlug(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => Self::InvalidSlug(err),
            SlugAsyncError::Predicate(err) => Self::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(GroupError::InvalidTitle);
        }

        let slug = match command.slug.map(|slug| slug.trim().to_string()) {
            Some(slug) => {
                validate_slug(&slug)?;
                if self.groups.find_group_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::DuplicateSlug(slug));
                }
                slug
            }
            None => {
                let groups = self.groups.clone();
                generate_unique_slug_async(&title, move |candidate| {
                    let groups = groups.clone();
                    async move {
                        Ok::<_, RepoError>(groups.find_group_by_slug(&candidate).await?.is_none())
                    }
                })
                .await?
            }
        };

        let group = match self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
        {
            Ok(group) => group,
            Err(RepoError::Duplicate { .. }) => return Err(GroupError::DuplicateSlug(slug)),
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    /// Delete a group by slug. Its posts stay, detached from any group.
    pub async fn delete(&self, slug: &str) -> Result<GroupRecord, GroupError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| GroupError::UnknownGroup(slug.to_string()))?;

        self.groups.delete_group(group.id).await?;
        info!(
            target = "yatube::application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group deleted"
        );
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupWithCount>, GroupError> {
        Ok(self.groups.list_groups_with_counts().await?)
    }
}
