pub mod app;
pub mod assistant;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod routes;
pub mod search;
pub mod session;

// Re-export key functions for convenience
pub use app::{AppState, build_state, create_app, init_tracing};
