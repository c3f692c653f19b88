// Service exports
pub mod cache;
pub mod notify;
pub mod postgres;
pub mod profiles;
pub mod store;

pub use cache::{CacheKey, ProfileCache};
pub use notify::{Notifier, NullNotifier, SocketGateway};
pub use postgres::{HistoryClient, HistoryError, HistoryStore, NullHistory};
pub use profiles::{MemoryProfiles, ProfileApiClient, ProfileApiError, ProfileRepository};
pub use store::{MemoryStore, RedisStore, StateStore, StoreError};
