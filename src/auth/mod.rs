//! Credentials and session tokens.
//!
//! - Passwords are hashed with Argon2.
//! - A session is a short-lived HS256 JWT ([`SessionKeys`]).
//! - Browsers only ever hold the JWT encrypted by [`crate::crypto::TokenCodec`],
//!   in the `token` cookie ([`cookie`]).

pub mod cookie;
mod token;

pub use token::{IssuedToken, SessionClaims, SessionKeys, TokenError};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use sqlx::SqlitePool;

use crate::db::{LoginUser, User};

lazy_static! {
    /// Hash checked against when the email is unknown, so both failure paths
    /// cost one Argon2 verification.
    static ref DUMMY_HASH: String = hash_password("shopfloor-dummy-password").unwrap_or_default();
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password; deliberately not told apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// An authenticated user: the stored row (for token claims) and the
/// sanitized projection returned to clients.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user_id: String,
    pub profile: LoginUser,
}

/// Look the user up by email and check the password.
///
/// The email must already be validated and normalized.
pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Authenticated, AuthError> {
    let user = User::find_by_email(db, email).await?;

    let Some(user) = user else {
        verify_password(password, &DUMMY_HASH);
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(Authenticated {
        profile: user.login_projection(),
        user_id: user.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, NewUser, Role};

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_verify_against_garbage_hash_is_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    async fn pool_with_user() -> SqlitePool {
        let pool = db::init_in_memory().await.unwrap();
        User::create(
            &pool,
            &NewUser {
                name: "Tess Tech".into(),
                email: "tech@example.com".into(),
                password_hash: hash_password("secret1").unwrap(),
                role: Role::Technician,
                level: Some("senior".into()),
                picture_url: Some("/img/tess.png".into()),
                break_times: vec![],
            },
        )
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_authenticate_success_returns_projection() {
        let pool = pool_with_user().await;
        let auth = authenticate(&pool, "tech@example.com", "secret1").await.unwrap();
        assert_eq!(auth.profile.email, "tech@example.com");
        assert_eq!(auth.profile.role, Role::Technician);
        assert_eq!(auth.profile.picture_url.as_deref(), Some("/img/tess.png"));
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_indistinguishable() {
        let pool = pool_with_user().await;

        let wrong_password = authenticate(&pool, "tech@example.com", "secret2").await;
        let unknown_email = authenticate(&pool, "nobody@example.com", "secret1").await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
        assert_eq!(
            wrong_password.unwrap_err().to_string(),
            unknown_email.unwrap_err().to_string()
        );
    }
}
