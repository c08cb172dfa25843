//! Authentication core.
//!
//! Secret hashing, access-token codec, refresh-token rotation with reuse
//! detection, login lockout, password resets, and the service that composes
//! them per request.

pub mod handlers;
pub mod lockout;
pub mod password;
pub mod refresh;
pub mod reset;
pub mod service;
pub mod token;

pub use lockout::{LockoutPolicy, LoginGuard};
pub use refresh::RefreshTokenManager;
pub use reset::PasswordResetManager;
pub use service::{AuthService, TokenPair};
pub use token::{Claims, TokenCodec};
