mod credentials;
mod preferences;
mod schema;
mod tab_settings;
mod types;
mod year_cache;

pub use credentials::DATA_API_KEY;
pub use schema::Database;
pub use types::{CacheEntry, CacheStats, DatabaseError};
