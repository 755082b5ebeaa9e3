pub mod gateway;
pub mod rate_limiter;
pub mod retry;

pub use gateway::{Gateway, GatewayError, GatewayStats};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
