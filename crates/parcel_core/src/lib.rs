//! Core persistence and use-case logic for parcel tracking.
//! This crate owns the `parcel` table and the guard rule on its mutations.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::parcel::{
    ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError, UNASSIGNED_NUMBER,
};
pub use repo::parcel_repo::{
    MutationOutcome, ParcelRepository, RepoError, RepoResult, SqliteParcelRepository,
};
pub use service::parcel_service::{ParcelService, ParcelServiceError, ParcelServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
