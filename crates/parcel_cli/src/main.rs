//! CLI smoke entry point.
//!
//! # Responsibility
//! - Drive one full parcel lifecycle against a database file.
//! - Print each step so a local run doubles as a sanity check.
//!
//! Usage: `parcel_cli [db_path]` (defaults to `tracker.db`). Rolling logs are
//! written to a `logs/` directory next to the database file.

use parcel_core::db::open_db;
use parcel_core::{
    default_log_level, init_logging, ClientId, ParcelService, ParcelServiceError,
    SqliteParcelRepository,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "tracker.db";
const LOG_DIR_NAME: &str = "logs";
const DEMO_CLIENT: ClientId = 1;

fn main() -> ExitCode {
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    match run(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parcel_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &str) -> Result<(), Box<dyn Error>> {
    let log_dir = log_dir_for(db_path)?;
    let log_dir = log_dir
        .to_str()
        .ok_or("log directory path is not valid UTF-8")?;
    init_logging(default_log_level(), log_dir)?;

    println!("parcel_core version={}", parcel_core::core_version());

    let conn = open_db(db_path)?;
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn)?);

    let parcel = service.register(DEMO_CLIENT, "Pskov, Verkhnyaya st. 5")?;
    println!("registered {parcel}");

    service.change_address(parcel.number, "Saratov, Vesenniy lane 4")?;
    println!("address changed for parcel {}", parcel.number);

    if let Some(status) = service.next_status(parcel.number)? {
        println!("parcel {} moved to {status}", parcel.number);
    }
    print_client_parcels(&service, DEMO_CLIENT)?;

    match service.delete(parcel.number) {
        Err(ParcelServiceError::NotRegistered { number, status }) => {
            println!("parcel {number} kept: status is {status}");
        }
        other => other?,
    }

    let spare = service.register(DEMO_CLIENT, "Pskov, Verkhnyaya st. 5")?;
    println!("registered {spare}");
    service.delete(spare.number)?;
    println!("deleted parcel {}", spare.number);

    print_client_parcels(&service, DEMO_CLIENT)
}

fn print_client_parcels(
    service: &ParcelService<SqliteParcelRepository<'_>>,
    client: ClientId,
) -> Result<(), Box<dyn Error>> {
    let parcels = service.parcels_of_client(client)?;
    println!("client {client} parcels ({}):", parcels.len());
    for parcel in parcels {
        let lock = if parcel.is_mutable() {
            "editable"
        } else {
            "locked"
        };
        println!("  {parcel} [{lock}]");
    }
    Ok(())
}

/// Resolves the absolute `logs/` directory beside the database file.
fn log_dir_for(db_path: &str) -> std::io::Result<PathBuf> {
    let db_path = std::env::current_dir()?.join(db_path);
    let parent = db_path.parent().unwrap_or(Path::new("/"));
    Ok(parent.join(LOG_DIR_NAME))
}
