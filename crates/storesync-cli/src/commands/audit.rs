use std::path::Path;

use storesync_core::store::SqliteDocumentStore;

use crate::commands::common::{format_audit_line, print_json};
use crate::error::CliError;

pub fn run_audit(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = SqliteDocumentStore::open(db_path)?;
    let events = store.recent_audit_events(limit)?;

    if as_json {
        print_json(&events)?;
    } else if events.is_empty() {
        println!("No sync activity recorded.");
    } else {
        for event in &events {
            println!("{}", format_audit_line(event));
        }
    }

    Ok(())
}
