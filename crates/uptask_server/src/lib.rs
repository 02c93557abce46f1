//! HTTP and WebSocket surface of the UpTask server.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use auth::SessionKeys;
pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
