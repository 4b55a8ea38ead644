//! The API layer, containing web handlers and routing.

pub mod handlers;
pub mod middleware;
pub mod router;

pub use middleware::API_KEY_HEADER;
pub use router::{RateLimitConfig, create_router, create_router_with_rate_limit};
