//! HTTP server module for the hours backend.
//!
//! Read-only REST API over the repository layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                              │
//! │  - ordering parameter validation                         │
//! │  - DTO projection and JSON serialization                 │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (db/services.rs)                          │
//! │  - publication filtering                                 │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                  │
//! │  - LocalRepository / PostgresRepository                  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use registry::{DuplicateResource, RESOURCES};
pub use router::create_router;
pub use state::AppState;
