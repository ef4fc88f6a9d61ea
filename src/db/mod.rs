// Database Module
// Connection pooling, errors and repositories for the scraper tables

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DbError;
pub use pool::DbPool;
pub use repositories::Repositories;
