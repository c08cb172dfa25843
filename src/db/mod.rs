//! Database module: the credential store.
//!
//! Owns the `users`, `refresh_tokens` and `password_reset_tokens` tables;
//! everything else in the crate goes through `DbOperations`.

pub mod models;
pub mod operations;

pub use models::{PasswordResetToken, RefreshToken, User};
pub use operations::DbOperations;
