//! Repository behaviour against a real database. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use yatube::{
    application::{
        pagination::Paginator,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, PostListScope,
            PostsRepo, PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    domain::entities::UserRecord,
    infra::db::PostgresRepositories,
};

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash: "unused".to_string(),
        })
        .await
        .expect("create user")
}

async fn post(repos: &PostgresRepositories, author: &UserRecord, text: &str, group_id: Option<i64>) -> i64 {
    repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id,
            image: None,
        })
        .await
        .expect("create post")
        .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn listings_are_newest_first_and_scoped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".into(),
            slug: "cats".into(),
            description: String::new(),
        })
        .await
        .expect("create group");

    let first = post(&repos, &leo, "first", Some(group.id)).await;
    let second = post(&repos, &anna, "second", None).await;
    let third = post(&repos, &leo, "third", None).await;

    let window = Paginator::default().window(3, None);
    let all = repos
        .list_posts(PostListScope::All, window)
        .await
        .expect("list all");
    let ids: Vec<i64> = all.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![third, second, first]);
    assert_eq!(all[2].group.as_ref().map(|g| g.slug.as_str()), Some("cats"));

    assert_eq!(repos.count_posts(PostListScope::Group(group.id)).await.expect("count"), 1);
    assert_eq!(repos.count_posts(PostListScope::Author(leo.id)).await.expect("count"), 2);

    assert!(repos.follow(anna.id, leo.id).await.expect("follow"));
    assert!(!repos.follow(anna.id, leo.id).await.expect("follow again"));
    assert_eq!(
        repos
            .count_posts(PostListScope::FollowedBy(anna.id))
            .await
            .expect("count"),
        2
    );
    assert_eq!(repos.count_followers(leo.id).await.expect("followers"), 1);
    assert!(repos.unfollow(anna.id, leo.id).await.expect("unfollow"));
    assert!(!repos.is_following(anna.id, leo.id).await.expect("is following"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn deletes_cascade_the_right_way(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Dogs".into(),
            slug: "dogs".into(),
            description: String::new(),
        })
        .await
        .expect("create group");
    let id = post(&repos, &leo, "woof", Some(group.id)).await;
    repos
        .create_comment(CreateCommentParams {
            post_id: id,
            author_id: leo.id,
            text: "good dog".into(),
        })
        .await
        .expect("create comment");

    repos.delete_group(group.id).await.expect("delete group");
    let kept = repos
        .find_post_by_id(id)
        .await
        .expect("find")
        .expect("post kept");
    assert!(kept.group.is_none());

    let updated = repos
        .update_post(UpdatePostParams {
            id,
            text: "woof woof".into(),
            group_id: None,
            image: Some("posts/dog.gif".into()),
        })
        .await
        .expect("update");
    assert_eq!(updated.created_at, kept.created_at);
    assert_eq!(updated.image.as_deref(), Some("posts/dog.gif"));

    repos.delete_post(id).await.expect("delete post");
    assert!(repos.list_comments_for_post(id).await.expect("comments").is_empty());
    assert!(matches!(repos.delete_post(id).await, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn usernames_are_unique_and_sessions_expire(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let duplicate = repos
        .create_user(CreateUserParams {
            username: "leo".into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password_hash: "unused".into(),
        })
        .await;
    assert!(matches!(duplicate, Err(RepoError::Duplicate { .. })));

    let now = OffsetDateTime::now_utc();
    for (prefix, expires_at) in [("expired0001", now - Duration::hours(1)), ("current0001", now + Duration::hours(1))] {
        repos
            .create_session(CreateSessionParams {
                id: Uuid::new_v4(),
                prefix: prefix.into(),
                hashed_secret: vec![0; 32],
                user_id: leo.id,
                expires_at,
            })
            .await
            .expect("create session");
    }

    assert_eq!(repos.delete_expired_sessions(now).await.expect("prune"), 1);
    assert!(repos.find_session_by_prefix("expired0001").await.expect("find").is_none());
    assert!(repos.find_session_by_prefix("current0001").await.expect("find").is_some());
}
