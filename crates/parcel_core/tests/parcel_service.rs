use parcel_core::db::open_db_in_memory;
use parcel_core::{
    ClientId, MutationOutcome, Parcel, ParcelNumber, ParcelRepository, ParcelService,
    ParcelServiceError, ParcelStatus, ParcelValidationError, RepoResult, SqliteParcelRepository,
};
use rusqlite::Connection;

/// Repository whose guarded writes are followed by a delete from another
/// writer before the service can re-read the row.
struct DeletedAfterGuardRepository<'conn> {
    inner: SqliteParcelRepository<'conn>,
    conn: &'conn Connection,
}

impl DeletedAfterGuardRepository<'_> {
    fn remove_row(&self, number: ParcelNumber) {
        self.conn
            .execute("DELETE FROM parcel WHERE number = ?1;", [number])
            .unwrap();
    }
}

impl ParcelRepository for DeletedAfterGuardRepository<'_> {
    fn add(&self, parcel: &Parcel) -> RepoResult<ParcelNumber> {
        self.inner.add(parcel)
    }

    fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.inner.get(number)
    }

    fn get_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        self.inner.get_by_client(client)
    }

    fn set_status(
        &self,
        number: ParcelNumber,
        status: &ParcelStatus,
    ) -> RepoResult<MutationOutcome> {
        self.inner.set_status(number, status)
    }

    fn set_address(&self, number: ParcelNumber, address: &str) -> RepoResult<MutationOutcome> {
        let outcome = self.inner.set_address(number, address)?;
        if outcome == MutationOutcome::PreconditionFailed {
            self.remove_row(number);
        }
        Ok(outcome)
    }

    fn delete(&self, number: ParcelNumber) -> RepoResult<MutationOutcome> {
        let outcome = self.inner.delete(number)?;
        if outcome == MutationOutcome::PreconditionFailed {
            self.remove_row(number);
        }
        Ok(outcome)
    }
}

#[test]
fn register_creates_registered_parcel_with_number() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    let parcel = service.register(5, "Main street 1").unwrap();
    assert!(parcel.number > 0);
    assert_eq!(parcel.status, ParcelStatus::Registered);

    let loaded = service.get(parcel.number).unwrap();
    assert_eq!(loaded, parcel);
}

#[test]
fn register_rejects_blank_address() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    let err = service.register(5, "\t").unwrap_err();
    assert!(matches!(
        err,
        ParcelServiceError::InvalidAddress(ParcelValidationError::BlankAddress)
    ));
    assert!(service.parcels_of_client(5).unwrap().is_empty());
}

#[test]
fn next_status_walks_lifecycle_and_stops_at_delivered() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let parcel = service.register(5, "Main street 1").unwrap();

    assert_eq!(
        service.next_status(parcel.number).unwrap(),
        Some(ParcelStatus::Sent)
    );
    assert_eq!(
        service.next_status(parcel.number).unwrap(),
        Some(ParcelStatus::Delivered)
    );
    assert_eq!(service.next_status(parcel.number).unwrap(), None);
    assert_eq!(
        service.get(parcel.number).unwrap().status,
        ParcelStatus::Delivered
    );
}

#[test]
fn next_status_on_missing_parcel_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    assert!(matches!(
        service.next_status(9),
        Err(ParcelServiceError::ParcelNotFound(9))
    ));
}

#[test]
fn change_address_is_locked_after_sending() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let parcel = service.register(5, "old address").unwrap();

    service.change_address(parcel.number, "new address").unwrap();
    assert_eq!(service.get(parcel.number).unwrap().address, "new address");

    service.next_status(parcel.number).unwrap();
    let err = service
        .change_address(parcel.number, "late address")
        .unwrap_err();
    assert!(matches!(
        err,
        ParcelServiceError::NotRegistered {
            status: ParcelStatus::Sent,
            ..
        }
    ));
    assert_eq!(service.get(parcel.number).unwrap().address, "new address");
}

#[test]
fn change_address_rejects_blank_input_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let parcel = service.register(5, "old address").unwrap();

    assert!(matches!(
        service.change_address(parcel.number, ""),
        Err(ParcelServiceError::InvalidAddress(_))
    ));
    assert_eq!(service.get(parcel.number).unwrap().address, "old address");
}

#[test]
fn delete_reports_guard_and_missing_parcels() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let kept = service.register(5, "kept").unwrap();
    let removed = service.register(5, "removed").unwrap();

    service.next_status(kept.number).unwrap();
    assert!(matches!(
        service.delete(kept.number),
        Err(ParcelServiceError::NotRegistered { number, .. }) if number == kept.number
    ));

    service.delete(removed.number).unwrap();
    assert!(matches!(
        service.delete(removed.number),
        Err(ParcelServiceError::ParcelNotFound(number)) if number == removed.number
    ));

    let remaining: Vec<_> = service
        .parcels_of_client(5)
        .unwrap()
        .into_iter()
        .map(|parcel| parcel.number)
        .collect();
    assert_eq!(remaining, vec![kept.number]);
}

#[test]
fn parcel_serializes_status_as_snake_case_tag() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let parcel = service.register(5, "json street").unwrap();

    let value = serde_json::to_value(&parcel).unwrap();
    assert_eq!(value["status"], "registered");
    assert_eq!(value["number"], parcel.number);
    assert_eq!(value["address"], "json street");
}

#[test]
fn guard_failure_followed_by_concurrent_delete_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(DeletedAfterGuardRepository {
        inner: SqliteParcelRepository::try_new(&conn).unwrap(),
        conn: &conn,
    });

    let moved = service.register(6, "first").unwrap();
    let removed = service.register(6, "second").unwrap();
    service.next_status(moved.number).unwrap();
    service.next_status(removed.number).unwrap();

    assert!(matches!(
        service.change_address(moved.number, "late"),
        Err(ParcelServiceError::ParcelNotFound(number)) if number == moved.number
    ));
    assert!(matches!(
        service.delete(removed.number),
        Err(ParcelServiceError::ParcelNotFound(number)) if number == removed.number
    ));
    assert!(service.parcels_of_client(6).unwrap().is_empty());
}

#[test]
fn next_status_skips_parcels_with_unknown_status() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let parcel = service.register(5, "Main street 1").unwrap();
    conn.execute(
        "UPDATE parcel SET status = 'returned' WHERE number = ?1;",
        [parcel.number],
    )
    .unwrap();

    assert_eq!(service.next_status(parcel.number).unwrap(), None);
    assert_eq!(
        service.get(parcel.number).unwrap().status,
        ParcelStatus::Other("returned".to_string())
    );
}
