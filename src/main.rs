use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        auth::AuthService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        forms::SignupInput,
        groups::{CreateGroupCommand, GroupService},
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::MediaStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
        config::Command::Users(args) => run_users(settings, args.command).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_auth_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AuthService, AppError> {
    let session_ttl = time::Duration::try_from(settings.auth.session_ttl)
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let sessions: Arc<dyn SessionsRepo> = repositories.clone();
    Ok(AuthService::new(users, sessions, session_ttl))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let media = Arc::new(
        MediaStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );

    let feed = FeedService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        comments_repo.clone(),
    );
    let posts = PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        comments_repo,
        media.clone(),
    );
    let follows = FollowService::new(users_repo, follows_repo);
    let auth = build_auth_service(&repositories, settings)?;

    Ok(HttpState {
        feed: Arc::new(feed),
        posts: Arc::new(posts),
        follows: Arc::new(follows),
        auth: Arc::new(auth),
        media,
        health: health_repo,
        cache: CacheState::new(CacheConfig::from(&settings.cache)),
        cookie_secure: settings.auth.cookie_secure,
        max_request_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;

    let prune_handle = spawn_session_pruner(state.auth.clone(), settings.auth.session_prune_interval);
    let result = serve_http(&settings, state).await;

    prune_handle.abort();
    let _ = prune_handle.await;

    result
}

fn spawn_session_pruner(auth: Arc<AuthService>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match auth.prune_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => {
                    metrics::counter!("yatube_sessions_pruned_total").increment(removed);
                    info!(target = "yatube::auth", removed, "pruned expired sessions");
                }
                Err(err) => {
                    warn!(target = "yatube::auth", error = %err, "failed to prune sessions");
                }
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))?;
    info!(target = "yatube::serve", %addr, "listening");

    let draining = Arc::new(Notify::new());
    let signal = draining.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "yatube::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "yatube::serve", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "yatube::serve", "shutdown requested");
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    match command {
        config::GroupsCommand::Create(args) => {
            let group = service
                .create(CreateGroupCommand {
                    title: args.title,
                    slug: args.slug,
                    description: args.description,
                })
                .await?;
            println!("created group {} ({})", group.slug, group.title);
        }
        config::GroupsCommand::Delete(args) => {
            let group = service.delete(&args.slug).await?;
            println!("deleted group {}", group.slug);
        }
        config::GroupsCommand::List(_) => {
            for entry in service.list().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.group.id, entry.group.slug, entry.group.title, entry.post_count
                );
            }
        }
    }

    Ok(())
}

async fn run_users(settings: config::Settings, command: config::UsersCommand) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let auth = build_auth_service(&repositories, &settings)?;

    match command {
        config::UsersCommand::Create(args) => {
            let input = SignupInput {
                first_name: args.first_name,
                last_name: args.last_name,
                username: args.username,
                email: args.email,
                password1: args.password.clone(),
                password2: args.password,
            };
            let user = auth.register(&input).await?;
            println!("created user {} (id {})", user.username, user.id);
        }
    }

    Ok(())
}
