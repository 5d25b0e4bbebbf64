//! Parcel domain model.
//!
//! # Responsibility
//! - Define the canonical parcel record persisted in the `parcel` table.
//! - Own the lifecycle status set and its forward progression.
//!
//! # Invariants
//! - `number` is assigned by storage and never changes afterwards.
//! - `created_at` is an RFC3339 timestamp set once at creation.
//! - `address` is never blank.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned parcel identifier.
pub type ParcelNumber = i64;

/// Identifier of the client owning a parcel.
pub type ClientId = i64;

/// Placeholder `number` carried by parcels that were not persisted yet.
pub const UNASSIGNED_NUMBER: ParcelNumber = 0;

/// Parcel lifecycle state.
///
/// Tags outside the known lifecycle are carried verbatim in `Other`, so rows
/// written by other collaborators stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParcelStatus {
    /// Accepted for delivery; address may still change.
    Registered,
    /// Handed over to the carrier.
    Sent,
    /// Received by the addressee.
    Delivered,
    Other(String),
}

impl ParcelStatus {
    /// Returns the storage tag for this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Other(tag) => tag,
        }
    }

    /// Maps a storage tag onto a status; unknown tags become `Other`.
    pub fn from_tag(value: &str) -> Self {
        match value {
            "registered" => Self::Registered,
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the next lifecycle step, or `None` for terminal and unknown states.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered | Self::Other(_) => None,
        }
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ParcelStatus {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

impl From<ParcelStatus> for String {
    fn from(value: ParcelStatus) -> Self {
        match value {
            ParcelStatus::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Validation failures for parcel records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelValidationError {
    /// Address is empty or whitespace only.
    BlankAddress,
    /// `created_at` is not an RFC3339 timestamp.
    InvalidCreatedAt(String),
}

impl Display for ParcelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankAddress => write!(f, "parcel address cannot be blank"),
            Self::InvalidCreatedAt(value) => {
                write!(f, "parcel created_at `{value}` is not an RFC3339 timestamp")
            }
        }
    }
}

impl Error for ParcelValidationError {}

/// Tracked shipment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Storage-assigned key; `UNASSIGNED_NUMBER` until inserted.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: ParcelStatus,
    /// Free-text delivery address.
    pub address: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl Parcel {
    /// Creates an unsaved `registered` parcel stamped with the current UTC time.
    pub fn new(client: ClientId, address: impl Into<String>) -> Self {
        Self::with_created_at(client, address, Utc::now())
    }

    /// Creates an unsaved `registered` parcel with a caller-provided timestamp.
    ///
    /// The timestamp is stored with second precision, `Z` suffix.
    pub fn with_created_at(
        client: ClientId,
        address: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            number: UNASSIGNED_NUMBER,
            client,
            status: ParcelStatus::Registered,
            address: address.into(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), ParcelValidationError> {
        validate_address(&self.address)?;
        if DateTime::parse_from_rfc3339(&self.created_at).is_err() {
            return Err(ParcelValidationError::InvalidCreatedAt(
                self.created_at.clone(),
            ));
        }
        Ok(())
    }

    /// Whether the guard rule currently allows address changes and deletion.
    pub fn is_mutable(&self) -> bool {
        self.status == ParcelStatus::Registered
    }
}

impl Display for Parcel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parcel {} to {} from client {}, status {}",
            self.number, self.address, self.client, self.status
        )
    }
}

/// Rejects blank addresses.
pub fn validate_address(address: &str) -> Result<(), ParcelValidationError> {
    if address.trim().is_empty() {
        return Err(ParcelValidationError::BlankAddress);
    }
    Ok(())
}
