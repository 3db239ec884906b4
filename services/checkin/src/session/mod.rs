pub mod api;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use store::RoleSessionStore;
