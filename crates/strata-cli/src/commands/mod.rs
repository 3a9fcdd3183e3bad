pub mod apply;
pub mod status;
pub mod unlock;

use crate::config::StrataConfig;
use std::path::Path;
use strata_store::db;

/// Open the configured database for writing, creating its directory if needed
pub fn open_database(
    config: &StrataConfig,
) -> Result<rusqlite::Connection, Box<dyn std::error::Error>> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(db::open_configured(&config.database, config.busy_timeout())?)
}

/// Open the database for reading without changing its settings
///
/// A database that does not exist yet reads as an empty one and is not created.
pub fn open_for_reading(
    config: &StrataConfig,
) -> Result<rusqlite::Connection, Box<dyn std::error::Error>> {
    let conn = if database_exists(config) {
        db::open(&config.database)?
    } else {
        db::open_in_memory()?
    };
    conn.busy_timeout(config.busy_timeout())?;
    Ok(conn)
}

/// Whether the database file exists yet (read-only commands never create it)
pub fn database_exists(config: &StrataConfig) -> bool {
    Path::new(&config.database).exists()
}
