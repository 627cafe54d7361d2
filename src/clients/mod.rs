pub mod store_client;

pub use store_client::{StoreApiError, StoreClient};
