//! Connection setup.
//!
//! Every connection handed out here enforces foreign keys and is at the
//! latest schema version. File databases also run in WAL mode.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum Storage {
    File,
    Memory,
}

impl Storage {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) the database at `path`.
///
/// `:memory:` is accepted and yields a private in-memory database.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if path == Path::new(":memory:") {
        return open_db_in_memory();
    }
    prepare(Storage::File, || Connection::open(path))
}

/// Opens a fresh in-memory database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    prepare(Storage::Memory, Connection::open_in_memory)
}

fn prepare(
    storage: Storage,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result: DbResult<Connection> = open()
        .map_err(Into::into)
        .and_then(|mut conn| configure(&mut conn, storage).map(|()| conn));

    let elapsed_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok storage={} duration_ms={elapsed_ms}",
            storage.as_str()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error storage={} duration_ms={elapsed_ms} error={err}",
            storage.as_str()
        ),
    }
    result
}

fn configure(conn: &mut Connection, storage: Storage) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if let Storage::File = storage {
        // journal_mode answers with a row, so it cannot go through execute.
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    apply_migrations(conn)
}
