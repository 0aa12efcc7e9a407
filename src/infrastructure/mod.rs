//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection and migrations (db)
//! - Configuration loading (config)
//! - Authentication (auth)
//! - Outbound email (mailer)
//! - Uploaded media (storage)
//! - Demo data (seed)
//! - Application state (state)

pub mod auth;
pub mod config;
pub mod db;
pub mod mailer;
pub mod seed;
pub mod state;
pub mod storage;

pub use state::AppState;
