//! On-disk schema versioning and one-way migration (component K).
//!
//! The single byte at `s:schema` identifies the on-disk layout. `open`
//! compares it to [`CURRENT_SCHEMA_VERSION`] and, if lower, runs every
//! migration routine between the stored version and the current one in
//! sequence, writing the new version only after all of them succeed.
//!
//! Migrations must never hold a transaction open across their own writes:
//! read whatever legacy records they need into memory, drop the read view,
//! then write. Nesting a write inside an open read was the historical
//! deadlock in this area and is forbidden structurally here by not handing
//! migrations a live iterator to write through.

use flightrec_core::error::{Error, Result};
use flightrec_core::key::schema_key;
use tracing::info;

use crate::engine::{Batch, Durability, Engine};

/// The schema version this build of the crate understands.
pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Reads `s:schema`, defaulting to `CURRENT_SCHEMA_VERSION` for a brand new
/// (empty) store, then runs any needed migrations and persists the result.
pub fn open_and_migrate(engine: &Engine) -> Result<u8> {
    let stored = match engine.get(schema_key())? {
        Some(bytes) => *bytes.first().ok_or_else(|| {
            Error::Corrupt("schema record is empty".into())
        })?,
        None => {
            // Fresh store: stamp it at the current version, no migration.
            write_schema_version(engine, CURRENT_SCHEMA_VERSION)?;
            return Ok(CURRENT_SCHEMA_VERSION);
        }
    };

    if stored > CURRENT_SCHEMA_VERSION {
        return Err(Error::Unsupported(format!(
            "on-disk schema {stored} is newer than this build ({CURRENT_SCHEMA_VERSION})"
        )));
    }

    let mut version = stored;
    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        info!(from = version, to = next, "storage: running schema migration");
        run_migration(engine, version, next)?;
        write_schema_version(engine, next)?;
        version = next;
    }

    Ok(version)
}

/// Runs the single migration step from `from` to `to`. There is currently
/// only one schema version, so this is a placeholder that documents the
/// read-snapshot-then-write discipline future migrations must follow.
fn run_migration(_engine: &Engine, _from: u8, _to: u8) -> Result<()> {
    Ok(())
}

fn write_schema_version(engine: &Engine, version: u8) -> Result<()> {
    let mut batch = Batch::new();
    batch.put(schema_key(), [version]);
    engine.apply_batch(batch, Durability::Sync)
}
