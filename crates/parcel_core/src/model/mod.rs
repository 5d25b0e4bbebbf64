//! Domain model for parcel tracking.
//!
//! # Responsibility
//! - Define the parcel record and its lifecycle status set.
//!
//! # Invariants
//! - Parcels are identified by a storage-assigned `ParcelNumber`.
//! - Deletion is a hard delete gated by the `registered` status.

pub mod parcel;
