use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::PageWindow;
use crate::application::repos::{
    CreatePostParams, PostListScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRef, PostRecord, display_name};

use super::{PostgresRepositories, map_sqlx_error};

/// Post columns joined with author and group. `p` must name a posts relation.
const POST_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.author_id, p.image, \
     u.username AS author_username, u.first_name AS author_first_name, \
     u.last_name AS author_last_name, \
     g.id AS group_id, g.slug AS group_slug, g.title AS group_title";

const POST_JOINS: &str = " INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

const POST_ORDER: &str = " ORDER BY p.created_at DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: i64,
    image: Option<String>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_id: Option<i64>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author_id: row.author_id,
            author_display_name: display_name(
                &row.author_first_name,
                &row.author_last_name,
                &row.author_username,
            ),
            author_username: row.author_username,
            group,
            image: row.image,
        }
    }
}

impl PostgresRepositories {
    fn post_query(from: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" FROM ");
        qb.push(from.to_string());
        qb.push(POST_JOINS);
        qb
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE 1=1");
        Self::apply_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostListScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(window.offset)
            .map_err(|_| RepoError::from_persistence("page offset exceeds supported range"))?;

        let mut qb = Self::post_query("posts p");
        qb.push(" WHERE 1=1");
        Self::apply_scope_conditions(&mut qb, scope);
        qb.push(POST_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = Self::post_query("posts p");
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "WITH inserted AS (INSERT INTO posts (author_id, text, group_id, image) VALUES (",
        );
        qb.push_bind(params.author_id);
        qb.push(", ");
        qb.push_bind(params.text);
        qb.push(", ");
        qb.push_bind(params.group_id);
        qb.push(", ");
        qb.push_bind(params.image);
        qb.push(") RETURNING *) ");
        qb.push(POST_SELECT);
        qb.push(" FROM inserted p");
        qb.push(POST_JOINS);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("WITH updated AS (UPDATE posts SET text = ");
        qb.push_bind(params.text);
        qb.push(", group_id = ");
        qb.push_bind(params.group_id);
        qb.push(", image = ");
        qb.push_bind(params.image);
        qb.push(" WHERE id = ");
        qb.push_bind(params.id);
        qb.push(" RETURNING *) ");
        qb.push(POST_SELECT);
        qb.push(" FROM updated p");
        qb.push(POST_JOINS);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
