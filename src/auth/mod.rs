//! Authentication: password hashing, user storage and cookie sessions

mod password;
mod repository;
mod service;
pub mod session;

pub use password::{hash_password, verify_password};
pub use repository::{DbError, InMemoryUserRepository, SqliteUserRepository, User, UserRepository};
pub use service::{AuthService, LoginError, SignupError, MIN_PASSWORD_LEN};
pub use session::{session_layer, Flash, FlashCategory, Session, SessionStore, SESSION_COOKIE};
