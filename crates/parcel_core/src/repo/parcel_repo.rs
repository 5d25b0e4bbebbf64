//! Parcel repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Map parcel operations 1:1 onto parameterized statements against `parcel`.
//! - Enforce the `registered` guard rule for address changes and deletion.
//!
//! # Invariants
//! - Write paths call `Parcel::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Status tags are passed through verbatim; unknown tags never fail reads.
//! - Guarded mutations that change zero rows are reported as outcomes, never
//!   as errors.
//! - Guarded mutations run under a savepoint, never `BEGIN`, so they nest
//!   inside a transaction the caller already holds.
//! - Every store failure is wrapped with the name of the failing operation.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::parcel::{
    validate_address, ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PARCEL_SELECT_SQL: &str = "SELECT
    number,
    client,
    status,
    address,
    created_at
FROM parcel";

const GUARD_SAVEPOINT: &str = "parcel_guard";

const REQUIRED_COLUMNS: [&str; 5] = ["number", "client", "status", "address", "created_at"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for parcel persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Store failure, tagged with the operation that issued the statement.
    Db {
        operation: &'static str,
        source: DbError,
    },
    Validation(ParcelValidationError),
    NotFound(ParcelNumber),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db { operation, source } => write!(f, "parcel {operation} failed: {source}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(number) => write!(f, "parcel not found: {number}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is older than required {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db { source, .. } => Some(source),
            Self::Validation(err) => Some(err),
            Self::NotFound(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ParcelValidationError> for RepoError {
    fn from(value: ParcelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Attaches the failing operation name to driver errors.
trait OperationContext<T> {
    fn during(self, operation: &'static str) -> RepoResult<T>;
}

impl<T> OperationContext<T> for rusqlite::Result<T> {
    fn during(self, operation: &'static str) -> RepoResult<T> {
        self.map_err(|err| RepoError::Db {
            operation,
            source: DbError::Sqlite(err),
        })
    }
}

/// Result of a single-row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Exactly one row changed.
    Updated,
    /// No parcel with the given number exists.
    NotFound,
    /// The parcel exists but is no longer `registered`.
    PreconditionFailed,
}

/// Repository interface for parcel operations.
pub trait ParcelRepository {
    /// Inserts a parcel and returns its storage-assigned number.
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber>;
    /// Loads one parcel; absence is `RepoError::NotFound`.
    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel>;
    /// Lists all parcels of a client ordered by number.
    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>>;
    /// Overwrites status without transition checks.
    fn set_status(&self, number: ParcelNumber, status: &ParcelStatus)
        -> RepoResult<MutationOutcome>;
    /// Overwrites address while the parcel is `registered`.
    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<MutationOutcome>;
    /// Removes the parcel while it is `registered`.
    fn delete(&self, number: ParcelNumber) -> RepoResult<MutationOutcome>;
}

/// SQLite-backed parcel store bound to one connection.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema does
    ///   not carry the `parcel` table shape.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_parcel_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn status_of(&self, number: ParcelNumber, operation: &'static str) -> RepoResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT status FROM parcel WHERE number = ?1;",
                [number],
                |row| row.get(0),
            )
            .optional()
            .during(operation)
    }

    /// Runs a guarded single-row statement and classifies a zero-row result.
    ///
    /// The statement and the classification read share one savepoint, which
    /// nests inside any transaction the caller already holds.
    fn guarded_mutation(
        &self,
        operation: &'static str,
        number: ParcelNumber,
        execute: impl FnOnce(&Connection) -> rusqlite::Result<usize>,
    ) -> RepoResult<MutationOutcome> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {GUARD_SAVEPOINT};"))
            .during(operation)?;

        let outcome = match self.classify_mutation(operation, number, execute) {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO {GUARD_SAVEPOINT}; RELEASE {GUARD_SAVEPOINT};"
                )) {
                    warn!(
                        "event=parcel_{operation} module=repo status=error number={number} error_code=savepoint_rollback_failed error={rollback_err}"
                    );
                }
                return Err(err);
            }
        };
        self.conn
            .execute_batch(&format!("RELEASE {GUARD_SAVEPOINT};"))
            .during(operation)?;

        debug!("event=parcel_{operation} module=repo status=ok number={number} outcome={outcome:?}");
        Ok(outcome)
    }

    fn classify_mutation(
        &self,
        operation: &'static str,
        number: ParcelNumber,
        execute: impl FnOnce(&Connection) -> rusqlite::Result<usize>,
    ) -> RepoResult<MutationOutcome> {
        let changed = execute(self.conn).during(operation)?;
        if changed > 0 {
            return Ok(MutationOutcome::Updated);
        }
        match self.status_of(number, operation)? {
            Some(_) => Ok(MutationOutcome::PreconditionFailed),
            None => Ok(MutationOutcome::NotFound),
        }
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        parcel.validate()?;

        self.conn
            .execute(
                "INSERT INTO parcel (client, status, address, created_at)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    parcel.client,
                    parcel.status.as_str(),
                    parcel.address.as_str(),
                    parcel.created_at.as_str(),
                ],
            )
            .during("add")?;
        let number = self.conn.last_insert_rowid();

        debug!(
            "event=parcel_add module=repo status=ok number={number} client={}",
            parcel.client
        );
        Ok(number)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE number = ?1;"))
            .during("get")?;
        let mut rows = stmt.query([number]).during("get")?;

        match rows.next().during("get")? {
            Some(row) => parse_parcel_row(row),
            None => Err(RepoError::NotFound(number)),
        }
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{PARCEL_SELECT_SQL} WHERE client = ?1 ORDER BY number ASC;"
            ))
            .during("get_by_client")?;
        let mut rows = stmt.query([client]).during("get_by_client")?;
        let mut parcels = Vec::new();

        while let Some(row) = rows.next().during("get_by_client")? {
            parcels.push(parse_parcel_row(row)?);
        }

        Ok(parcels)
    }

    fn set_status(
        &self,
        number: ParcelNumber,
        status: &ParcelStatus,
    ) -> RepoResult<MutationOutcome> {
        let changed = self
            .conn
            .execute(
                "UPDATE parcel SET status = ?1 WHERE number = ?2;",
                params![status.as_str(), number],
            )
            .during("set_status")?;

        let outcome = if changed > 0 {
            MutationOutcome::Updated
        } else {
            MutationOutcome::NotFound
        };
        debug!(
            "event=parcel_set_status module=repo status=ok number={number} new_status={status} outcome={outcome:?}"
        );
        Ok(outcome)
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<MutationOutcome> {
        validate_address(address)?;

        self.guarded_mutation("set_address", number, |conn| {
            conn.execute(
                "UPDATE parcel SET address = ?1 WHERE number = ?2 AND status = 'registered';",
                params![address, number],
            )
        })
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<MutationOutcome> {
        self.guarded_mutation("delete", number, |conn| {
            conn.execute(
                "DELETE FROM parcel WHERE number = ?1 AND status = 'registered';",
                [number],
            )
        })
    }
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let status_text: String = row.get("status").during("decode")?;
    let status = ParcelStatus::from_tag(&status_text);

    let parcel = Parcel {
        number: row.get("number").during("decode")?,
        client: row.get("client").during("decode")?,
        status,
        address: row.get("address").during("decode")?,
        created_at: row.get("created_at").during("decode")?,
    };
    parcel.validate()?;
    Ok(parcel)
}

fn ensure_parcel_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn).map_err(|source| RepoError::Db {
        operation: "connect",
        source,
    })?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "parcel").during("connect")? {
        return Err(RepoError::MissingRequiredTable("parcel"));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "parcel", column).during("connect")? {
            return Err(RepoError::MissingRequiredColumn {
                table: "parcel",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::db::DbError;
    use std::error::Error;

    #[test]
    fn db_error_display_names_operation() {
        let err = RepoError::Db {
            operation: "set_address",
            source: DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows),
        };
        assert!(err.to_string().starts_with("parcel set_address failed:"));
        assert!(err.source().is_some());
    }
}
