//! Maintenance entry point.
//!
//! # Responsibility
//! - Open (or create) an Arbornote database and run the system-subtree
//!   check against it.
//! - Keep output deterministic for quick local sanity checks.

use arbornote_core::db::open_db;
use arbornote_core::{
    DefaultSubtreeProvider, NoTranslation, ReconcileOptions, ReconcilerState, SqliteGraphRepository,
    SubtreeCheckOutcome, SubtreeService,
};
use rusqlite::{Transaction, TransactionBehavior};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        eprintln!("usage: arbornote <db-path> [--force] [--restore-names]");
        return ExitCode::from(2);
    };
    let mut force = false;
    let mut restore_names = false;
    for arg in args {
        match arg.as_str() {
            "--force" => force = true,
            "--restore-names" => restore_names = true,
            other => {
                eprintln!("unknown argument: {other}");
                return ExitCode::from(2);
            }
        }
    }

    match run(&db_path, force, restore_names) {
        Ok(outcome) => {
            println!("arbornote_core version={}", arbornote_core::core_version());
            println!("subtree check outcome={outcome}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("subtree check failed: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &str, force: bool, restore_names: bool) -> Result<&'static str, String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;

    // The whole check runs in one transaction: a failed pass rolls back and
    // a retry starts from unchanged state.
    let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
        .map_err(|err| err.to_string())?;
    let repo = SqliteGraphRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service = SubtreeService::new(repo);
    let mut state = ReconcilerState::new();

    let outcome = service
        .check_subtree(
            &mut state,
            force,
            ReconcileOptions { restore_names },
            &DefaultSubtreeProvider,
            &NoTranslation,
        )
        .map_err(|err| err.to_string())?;
    tx.commit().map_err(|err| err.to_string())?;

    Ok(match outcome {
        SubtreeCheckOutcome::Reconciled => "reconciled",
        SubtreeCheckOutcome::SkippedPendingMigrations => "skipped (pending migrations)",
    })
}
