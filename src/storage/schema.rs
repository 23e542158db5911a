use duckdb::Connection;

/// Append-only event log, one row per recorded interaction.
///
/// `seq` breaks timestamp ties so scans have a total, repeatable order.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE SEQUENCE IF NOT EXISTS events_seq START 1;
CREATE TABLE IF NOT EXISTS events (
    seq             BIGINT NOT NULL DEFAULT nextval('events_seq'),
    project_id      VARCHAR NOT NULL,
    type            VARCHAR NOT NULL,
    timestamp_ms    BIGINT NOT NULL,
    anon_user_id    VARCHAR,
    session_id      VARCHAR,
    url             VARCHAR,
    exp_id          VARCHAR,
    variant         VARCHAR,
    button_id       VARCHAR,
    goal            VARCHAR,
    meta            VARCHAR
)
";

/// Experiment registry consulted for the active-experiment count.
pub const CREATE_EXPERIMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS experiments (
    project_id  VARCHAR NOT NULL,
    id          VARCHAR NOT NULL,
    active      BOOLEAN,
    status      VARCHAR,
    PRIMARY KEY (project_id, id)
)
";

/// CRM lead records. Every column but the id is optional so partial
/// upserts can create rows.
pub const CREATE_LEADS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS leads (
    id                  VARCHAR PRIMARY KEY,
    company_name        VARCHAR,
    contact_name        VARCHAR,
    email               VARCHAR,
    phone               VARCHAR,
    account_manager     VARCHAR,
    lead_value          DOUBLE,
    priority            VARCHAR,
    company_size        VARCHAR,
    industry            VARCHAR,
    contact_method      VARCHAR,
    subscription_type   VARCHAR,
    current_phase       VARCHAR,
    status              VARCHAR,
    website             VARCHAR,
    notes               VARCHAR,
    created_at          BIGINT,
    created_by          VARCHAR,
    updated_at          BIGINT,
    updated_by          VARCHAR,
    deleted_at          BIGINT
)
";

/// Sales tallies: one row per (document, metric). Documents are rewritten
/// as a whole, so there is no key to upsert against.
pub const CREATE_SALES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sales (
    id      VARCHAR NOT NULL,
    metric  VARCHAR NOT NULL,
    value   DOUBLE
)
";

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_EVENTS_TABLE)?;
    conn.execute_batch(CREATE_EXPERIMENTS_TABLE)?;
    conn.execute_batch(CREATE_LEADS_TABLE)?;
    conn.execute_batch(CREATE_SALES_TABLE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conn: &Connection, table: &str) -> i64 {
        let mut stmt = conn
            .prepare(&format!("SELECT COUNT(*) FROM {table}"))
            .unwrap();
        stmt.query_row([], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        for table in ["events", "experiments", "leads", "sales"] {
            assert_eq!(count(&conn, table), 0);
        }
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // Should not error
    }

    #[test]
    fn test_event_seq_increments() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        for _ in 0..2 {
            conn.execute(
                "INSERT INTO events (project_id, type, timestamp_ms) VALUES ('p', 'pageview', 0)",
                [],
            )
            .unwrap();
        }
        let mut stmt = conn.prepare("SELECT MAX(seq) - MIN(seq) FROM events").unwrap();
        let gap: i64 = stmt.query_row([], |row| row.get(0)).unwrap();
        assert_eq!(gap, 1);
    }
}
