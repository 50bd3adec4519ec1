//! Signup and login rules

use super::password::{hash_password, verify_password};
use super::repository::{DbError, User, UserRepository};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Signup failures; the messages are shown to the user verbatim
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignupError {
    #[error("All fields required")]
    MissingFields,

    #[error("Passwords don't match")]
    PasswordMismatch,

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Signup failed, please try again")]
    Internal(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login failed, please try again")]
    Internal(String),
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Validate the form, hash the password and store the user.
    /// Checks run in order: presence, confirmation, length, uniqueness.
    pub async fn signup(&self, email: &str, password: &str, confirm: &str) -> Result<User, SignupError> {
        if email.is_empty() || password.is_empty() || confirm.is_empty() {
            return Err(SignupError::MissingFields);
        }
        if password != confirm {
            return Err(SignupError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SignupError::PasswordTooShort);
        }

        let hash = hash_password(password).map_err(|e| SignupError::Internal(e.to_string()))?;
        match self.users.create(email, &hash).await {
            Ok(user) => {
                info!(user_id = user.id, "User signed up");
                Ok(user)
            }
            Err(DbError::EmailExists) => Err(SignupError::EmailTaken),
            Err(e) => {
                warn!(error = %e, "Signup failed");
                Err(SignupError::Internal(e.to_string()))
            }
        }
    }

    /// Unknown email and wrong password are indistinguishable to the caller
    pub async fn login(&self, email: &str, password: &str) -> Result<User, LoginError> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(|e| LoginError::Internal(e.to_string()))?
            .ok_or(LoginError::InvalidCredentials)?;

        if verify_password(password, &user.password_hash) {
            info!(user_id = user.id, "User logged in");
            Ok(user)
        } else {
            Err(LoginError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryUserRepository;

    fn service() -> AuthService {
        AuthService::new(Arc::new(InMemoryUserRepository::new()))
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let auth = service();
        auth.signup("a@example.com", "secret1", "secret1").await.unwrap();
        let user = auth.login("a@example.com", "secret1").await.unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(
            auth.login("a@example.com", "wrong!!").await,
            Err(LoginError::InvalidCredentials)
        );
        assert_eq!(
            auth.login("nobody@example.com", "secret1").await,
            Err(LoginError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn test_signup_validation_order() {
        let auth = service();
        assert_eq!(auth.signup("", "a", "b").await, Err(SignupError::MissingFields));
        assert_eq!(auth.signup("a@x.io", "abc", "abd").await, Err(SignupError::PasswordMismatch));
        assert_eq!(auth.signup("a@x.io", "abc", "abc").await, Err(SignupError::PasswordTooShort));
    }

    #[tokio::test]
    async fn test_duplicate_signup() {
        let auth = service();
        auth.signup("a@example.com", "secret1", "secret1").await.unwrap();
        assert_eq!(
            auth.signup("a@example.com", "secret2", "secret2").await,
            Err(SignupError::EmailTaken)
        );
        assert_eq!(SignupError::EmailTaken.to_string(), "Email already registered");
    }
}
