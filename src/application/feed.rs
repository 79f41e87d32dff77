use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::presentation::views::{
    FollowContext, GroupContext, IndexContext, ListingView, PostDetailContext, ProfileContext,
    group_href, profile_href,
};

#[derive(Clone)]
pub enum FeedFilter {
    All,
    Group(String),
    Author(String),
    Following,
}

impl FeedFilter {
    pub fn base_path(&self) -> String {
        match self {
            FeedFilter::All => "/".to_string(),
            FeedFilter::Group(slug) => group_href(slug),
            FeedFilter::Author(username) => profile_href(username),
            FeedFilter::Following => "/follow/".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Read side of the site: paginated listings and the post detail page.
#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            paginator: Paginator::default(),
        }
    }

    pub async fn index(&self, page: Option<&str>) -> Result<IndexContext, FeedError> {
        let listing = self
            .listing(&FeedFilter::All, PostListScope::All, page)
            .await?;
        Ok(IndexContext { listing })
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupContext, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;

        let listing = self
            .listing(
                &FeedFilter::Group(group.slug.clone()),
                PostListScope::Group(group.id),
                page,
            )
            .await?;

        Ok(GroupContext {
            title: group.title,
            description: group.description,
            listing,
        })
    }

    pub async fn profile(
        &self,
        username: &str,
        page: Option<&str>,
        viewer: Option<&UserRecord>,
    ) -> Result<ProfileContext, FeedError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let listing = self
            .listing(
                &FeedFilter::Author(author.username.clone()),
                PostListScope::Author(author.id),
                page,
            )
            .await?;

        let show_follow_controls = viewer.is_some_and(|user| user.id != author.id);
        let following = match viewer {
            Some(user) if show_follow_controls => {
                self.follows.is_following(user.id, author.id).await?
            }
            _ => false,
        };
        let follower_count = self.follows.count_followers(author.id).await?;
        let base = profile_href(&author.username);

        Ok(ProfileContext {
            display_name: author.display_name(),
            post_count: listing.total,
            follower_count,
            show_follow_controls,
            following,
            follow_action: format!("{base}follow/"),
            unfollow_action: format!("{base}unfollow/"),
            username: author.username,
            listing,
        })
    }

    pub async fn follow_feed(
        &self,
        viewer: &UserRecord,
        page: Option<&str>,
    ) -> Result<FollowContext, FeedError> {
        let listing = self
            .listing(
                &FeedFilter::Following,
                PostListScope::FollowedBy(viewer.id),
                page,
            )
            .await?;
        Ok(FollowContext { listing })
    }

    pub async fn post_detail(
        &self,
        id: i64,
        viewer: Option<&UserRecord>,
    ) -> Result<PostDetailContext, FeedError> {
        let post = self.find_post(id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostListScope::Author(post.author_id))
            .await?;
        let comments = self.comments.list_comments_for_post(post.id).await?;

        Ok(PostDetailContext::new(
            &post,
            author_post_count,
            &comments,
            viewer,
        ))
    }

    pub async fn find_post(&self, id: i64) -> Result<PostRecord, FeedError> {
        self.posts
            .find_post_by_id(id)
            .await?
            .ok_or(FeedError::UnknownPost(id))
    }

    async fn listing(
        &self,
        filter: &FeedFilter,
        scope: PostListScope,
        page: Option<&str>,
    ) -> Result<ListingView, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = self.paginator.window(total, page);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts.list_posts(scope, window).await?
        };

        Ok(ListingView::from_page(
            &filter.base_path(),
            Page::new(items, window),
        ))
    }
}
