//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the parcel data access contract.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Parcel::validate()` before persistence.
//! - Repository APIs return semantic outcomes (`MutationOutcome`) in addition
//!   to DB transport errors.

pub mod parcel_repo;
