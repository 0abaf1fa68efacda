//! Persistence for the opening-hours model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (REST API, seeding binary)           │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - publication filtering                                │
//! │  - resolution of stored schedules                       │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/)                        │
//! │  - HoursRepository (reads)                              │
//! │  - IngestRepository (atomic writes)                     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴────────────────┐
//!     │                                │
//! ┌───▼──────────────────┐  ┌──────────▼──────────────┐
//! │ Postgres Repository  │  │ Local Repository        │
//! │ (Diesel + r2d2)      │  │ (in-memory)             │
//! └──────────────────────┘  └─────────────────────────┘
//! ```
//!
//! Write-time integrity rules shared by both backends are in [`validation`].

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;
pub mod validation;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    _private: (),
}

pub use factory::{RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FullRepository, HoursRepository, IngestRepository, RepositoryError,
    RepositoryResult, ScheduleUpdate,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Process-wide repository, set once by the binaries at start-up.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Build the repository and install it as the process-wide instance. Later
/// calls return the first instance.
///
/// `REPOSITORY_CONFIG` names a `repository.toml` to use; without it the
/// backend is picked from `REPOSITORY_TYPE` / `DATABASE_URL`.
pub async fn init_repository() -> Result<Arc<dyn FullRepository>> {
    if let Some(existing) = REPOSITORY.get() {
        return Ok(existing.clone());
    }

    let repo = match std::env::var("REPOSITORY_CONFIG") {
        Ok(path) => RepositoryFactory::from_config_file(&path)
            .await
            .with_context(|| format!("Failed to initialize repository from {}", path))?,
        Err(_) => RepositoryFactory::from_env()
            .await
            .context("Failed to initialize repository")?,
    };
    Ok(REPOSITORY.get_or_init(|| repo).clone())
}

/// The process-wide repository installed by [`init_repository`].
pub fn get_repository() -> Result<Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .cloned()
        .context("Repository not initialized. Call init_repository() first.")
}
