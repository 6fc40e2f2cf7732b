pub mod schema;

pub use schema::{ApiConfig, ChatConfig, Config, StoreConfig};
