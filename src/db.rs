//! Shared libsql plumbing for both stores.

use std::path::Path;

use libsql::{Builder, Connection};

use crate::error::{HarvestError, HarvestResult};

/// Opens (and if necessary creates) a local database file and applies the
/// connection pragmas every store relies on.
pub async fn open_local(path: &Path) -> HarvestResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            HarvestError::store(format!("creating directory {}: {err}", parent.display()))
        })?;
    }

    let db = Builder::new_local(path)
        .build()
        .await
        .map_err(|err| HarvestError::store(format!("opening {}: {err}", path.display())))?;
    let conn = db.connect()?;
    configure_connection(&conn).await?;
    Ok(conn)
}

async fn configure_connection(conn: &Connection) -> HarvestResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}
