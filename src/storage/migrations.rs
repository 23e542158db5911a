use duckdb::Connection;

type Migration = fn(&Connection) -> Result<(), duckdb::Error>;

/// Ordered schema steps; the position + 1 is the version a step brings the
/// database to.
const MIGRATIONS: &[Migration] = &[crate::storage::schema::init_schema];

/// Bring the database up to the latest schema version. Already applied
/// versions are skipped, so this is safe to call on every start.
pub fn run_migrations(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
    )?;

    let applied = schema_version(conn)?;
    for (version, migrate) in (1u32..).zip(MIGRATIONS) {
        if version <= applied {
            continue;
        }
        migrate(conn)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            [version],
        )?;
        tracing::info!(version, "Applied schema migration");
    }

    Ok(())
}

/// Highest applied schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, duckdb::Error> {
    let mut stmt = conn.prepare("SELECT COALESCE(MAX(version), 0) FROM schema_version")?;
    stmt.query_row([], |row| row.get(0))
}

/// Version the binary expects after migrating.
pub fn latest_version() -> u32 {
    u32::try_from(MIGRATIONS.len()).unwrap_or(u32::MAX)
}
