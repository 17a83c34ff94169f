//! Authentication: credential digests, Redis-backed sessions, and the
//! axum extractors protected routes use.

pub mod middleware;
pub mod password;
pub mod sessions;

pub use middleware::{BearerToken, CurrentUser, RequireAdmin};
pub use sessions::{Session, SessionStore};
