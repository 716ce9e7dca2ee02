//! Multi-tenant JSON key-value store served over HTTP.
//!
//! Each tenant owns a directory of named databases; each database is one
//! SQLite file. Access is gated per tenant, credential and HTTP verb.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use auth::{AccessContext, AuthTable};
pub use config::AppConfig;
pub use error::{AppError, StoreError};
pub use routes::create_router;
pub use state::AppState;
pub use store::TenantStore;
