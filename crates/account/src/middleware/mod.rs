//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//! 4. Rate limiting (governor) on login and the public reject link

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::{AuthRejection, OptionalAuth, RequireAuth, end_session, set_current_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, session_layer};
