//! Account creation, password login and cookie sessions.
//!
//! A session token has the shape `ys_<prefix>_<secret>`. Only the SHA-256
//! digest of the secret is stored; lookups go through the prefix and the
//! digest is compared in constant time.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::forms::{FormErrors, LoginInput, SignupInput};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "ys";
const MIN_SECRET_LEN: usize = 32;
const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    Invalid(FormErrors),
    #[error("failed to hash password: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A freshly opened session together with the raw token for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: UserRecord,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Create an account from the signup form and sign it in.
    pub async fn signup(&self, input: &SignupInput) -> Result<IssuedSession, AuthError> {
        let user = self.register(input).await?;
        self.open_session(user).await
    }

    /// Create an account without opening a session.
    pub async fn register(&self, input: &SignupInput) -> Result<UserRecord, AuthError> {
        let valid = input.validate().map_err(AuthError::Invalid)?;

        if self
            .users
            .find_user_by_username(&valid.username)
            .await?
            .is_some()
        {
            return Err(AuthError::Invalid(username_taken()));
        }

        let password_hash = hash_password_blocking(valid.password).await?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username: valid.username,
                first_name: valid.first_name,
                last_name: valid.last_name,
                email: valid.email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => return Err(AuthError::Invalid(username_taken())),
            Err(err) => return Err(err.into()),
        };

        info!(
            target = "yatube::auth",
            user_id = user.id,
            username = %user.username,
            "account created"
        );

        Ok(user)
    }

    pub async fn login(&self, input: &LoginInput) -> Result<IssuedSession, AuthError> {
        input.validate().map_err(AuthError::Invalid)?;

        let user = match self
            .users
            .find_user_by_username(input.username.trim())
            .await?
        {
            Some(user)
                if verify_password_blocking(user.password_hash.clone(), input.password.clone())
                    .await =>
            {
                Some(user)
            }
            _ => None,
        };
        let Some(user) = user else {
            warn!(
                target = "yatube::auth",
                username = %input.username.trim(),
                "rejected login attempt"
            );
            let mut errors = FormErrors::default();
            errors.add_non_field(INVALID_LOGIN);
            return Err(AuthError::Invalid(errors));
        };

        self.open_session(user).await
    }

    /// Issue a session for an already-authenticated user.
    pub async fn open_session(&self, user: UserRecord) -> Result<IssuedSession, AuthError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                id: Uuid::new_v4(),
                prefix,
                hashed_secret: hash_secret(&secret),
                user_id: user.id,
                expires_at,
            })
            .await?;

        Ok(IssuedSession {
            user,
            token,
            expires_at,
        })
    }

    /// Resolve a cookie token to its user. Malformed, unknown and expired
    /// tokens all resolve to `None`.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session_by_prefix(parsed.prefix).await? else {
            return Ok(None);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        let hashed_input = hash_secret(parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(None);
        }

        self.users.find_user_by_id(session.user_id).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), RepoError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(());
        };
        if let Some(session) = self.sessions.find_session_by_prefix(parsed.prefix).await?
            && session
                .hashed_secret
                .ct_eq(&hash_secret(parsed.secret))
                .unwrap_u8()
                == 1
        {
            self.sessions.delete_session(session.id).await?;
        }
        Ok(())
    }

    pub async fn prune_expired_sessions(&self) -> Result<u64, RepoError> {
        self.sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await
    }
}

fn username_taken() -> FormErrors {
    let mut errors = FormErrors::default();
    errors.add("username", "A user with that username already exists.");
    errors
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

/// Run argon2 on the blocking pool.
async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::Hashing(err.to_string()))?
}

async fn verify_password_blocking(stored_hash: String, password: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&stored_hash, &password)).await {
        Ok(matches) => matches,
        Err(err) => {
            warn!(target = "yatube::auth", error = %err, "password check did not complete");
            false
        }
    }
}

pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

struct ParsedToken<'a> {
    prefix: &'a str,
    secret: &'a str,
}

fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken { prefix, secret })
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
