// Service exports
pub mod accounts;
pub mod auth;
pub mod cache;
pub mod postgres;
pub mod push;

pub use accounts::{display_name, AccountDirectory};
pub use auth::{AuthError, AuthService, AuthenticatedUser, Claims, JwtVerifier};
pub use cache::{CacheError, CacheKey, CacheManager, CacheStats, Invalidation};
pub use postgres::{MatchFlag, PostgresClient, PostgresError};
pub use push::{PushClient, PushError, PushNotification};
