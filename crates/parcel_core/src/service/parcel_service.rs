//! Parcel use-case service.
//!
//! # Responsibility
//! - Provide registration, tracking and cancellation entry points.
//! - Translate repository outcomes into explicit business errors.
//!
//! # Invariants
//! - New parcels always start as `registered`.
//! - Status only moves forward (`registered -> sent -> delivered`).
//! - Service layer remains storage-agnostic.

use crate::model::parcel::{
    validate_address, ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
use crate::repo::parcel_repo::{MutationOutcome, ParcelRepository, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ParcelServiceResult<T> = Result<T, ParcelServiceError>;

/// Service error for parcel use-cases.
#[derive(Debug)]
pub enum ParcelServiceError {
    /// Address input failed validation.
    InvalidAddress(ParcelValidationError),
    /// Target parcel does not exist.
    ParcelNotFound(ParcelNumber),
    /// Target parcel left `registered`; address and deletion are locked.
    NotRegistered {
        number: ParcelNumber,
        status: ParcelStatus,
    },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ParcelServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress(err) => write!(f, "invalid address: {err}"),
            Self::ParcelNotFound(number) => write!(f, "parcel not found: {number}"),
            Self::NotRegistered { number, status } => write!(
                f,
                "parcel {number} has status `{status}`; only registered parcels can be changed"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ParcelServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAddress(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ParcelServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(number) => Self::ParcelNotFound(number),
            other => Self::Repo(other),
        }
    }
}

/// Parcel service facade over repository implementations.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client` and returns it with its number.
    pub fn register(
        &self,
        client: ClientId,
        address: impl Into<String>,
    ) -> ParcelServiceResult<Parcel> {
        let mut parcel = Parcel::new(client, address);
        validate_address(&parcel.address).map_err(ParcelServiceError::InvalidAddress)?;

        parcel.number = self.repo.add(&parcel)?;
        info!(
            "event=parcel_register module=service status=ok number={} client={}",
            parcel.number, client
        );
        Ok(parcel)
    }

    /// Gets one parcel by number.
    pub fn get(&self, number: ParcelNumber) -> ParcelServiceResult<Parcel> {
        Ok(self.repo.get(number)?)
    }

    /// Lists every parcel owned by `client`.
    pub fn parcels_of_client(&self, client: ClientId) -> ParcelServiceResult<Vec<Parcel>> {
        Ok(self.repo.get_by_client(client)?)
    }

    /// Moves a parcel one lifecycle step forward.
    ///
    /// Returns the new status, or `None` without writing when the parcel is
    /// already delivered or carries a status outside the known lifecycle.
    pub fn next_status(&self, number: ParcelNumber) -> ParcelServiceResult<Option<ParcelStatus>> {
        let parcel = self.repo.get(number)?;
        let Some(next) = parcel.status.next() else {
            info!(
                "event=parcel_next_status module=service status=skipped number={number} reason=terminal current_status={}",
                parcel.status
            );
            return Ok(None);
        };

        match self.repo.set_status(number, &next)? {
            MutationOutcome::Updated => {
                info!(
                    "event=parcel_next_status module=service status=ok number={number} from={} to={next}",
                    parcel.status
                );
                Ok(Some(next))
            }
            _ => Err(ParcelServiceError::ParcelNotFound(number)),
        }
    }

    /// Changes the delivery address of a registered parcel.
    pub fn change_address(
        &self,
        number: ParcelNumber,
        address: &str,
    ) -> ParcelServiceResult<()> {
        validate_address(address).map_err(ParcelServiceError::InvalidAddress)?;
        let outcome = self.repo.set_address(number, address)?;
        self.expect_updated("parcel_change_address", number, outcome)
    }

    /// Deletes a registered parcel.
    pub fn delete(&self, number: ParcelNumber) -> ParcelServiceResult<()> {
        let outcome = self.repo.delete(number)?;
        self.expect_updated("parcel_delete", number, outcome)
    }

    fn expect_updated(
        &self,
        event: &'static str,
        number: ParcelNumber,
        outcome: MutationOutcome,
    ) -> ParcelServiceResult<()> {
        match outcome {
            MutationOutcome::Updated => {
                info!("event={event} module=service status=ok number={number}");
                Ok(())
            }
            MutationOutcome::NotFound => {
                warn!("event={event} module=service status=rejected number={number} reason=not_found");
                Err(ParcelServiceError::ParcelNotFound(number))
            }
            MutationOutcome::PreconditionFailed => {
                // Re-read for the error detail; a concurrent delete surfaces as
                // `ParcelNotFound`.
                let status = self.repo.get(number)?.status;
                warn!(
                    "event={event} module=service status=rejected number={number} reason=not_registered current_status={status}"
                );
                Err(ParcelServiceError::NotRegistered { number, status })
            }
        }
    }
}
