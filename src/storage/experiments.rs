use duckdb::Connection;
use serde::{Deserialize, Serialize};

/// Registry state of one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentEntry {
    pub active: Option<bool>,
    pub status: Option<String>,
}

/// Create or update a registry entry. Absent fields keep their stored value.
pub fn upsert_experiment(
    conn: &Connection,
    project_id: &str,
    exp_id: &str,
    entry: &ExperimentEntry,
) -> Result<(), duckdb::Error> {
    conn.execute(
        "INSERT INTO experiments (project_id, id, active, status) VALUES (?, ?, ?, ?)
         ON CONFLICT (project_id, id) DO UPDATE SET
             active = COALESCE(excluded.active, active),
             status = COALESCE(excluded.status, status)",
        duckdb::params![project_id, exp_id, entry.active, entry.status],
    )?;
    Ok(())
}

/// Experiments flagged `active = true`.
pub fn count_flagged_active(conn: &Connection, project_id: &str) -> Result<u64, duckdb::Error> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM experiments WHERE project_id = ? AND active = true")?;
    stmt.query_row([project_id], |row| row.get(0))
}

/// Experiments whose status is `'active'`.
pub fn count_status_active(conn: &Connection, project_id: &str) -> Result<u64, duckdb::Error> {
    let mut stmt = conn
        .prepare("SELECT COUNT(*) FROM experiments WHERE project_id = ? AND status = 'active'")?;
    stmt.query_row([project_id], |row| row.get(0))
}
