pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod observability;
pub mod routes;
pub mod server;
pub mod storage;

pub use config::{AppConfig, AuthConfig, PostgresStorageConfig, ServerConfig, StorageConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, SeedlineServer, ServerBuilder, build_app, build_router};
pub use storage::StorageHandles;
