//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own parcel business rules (registration defaults, forward-only status).

pub mod parcel_service;
