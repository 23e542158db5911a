//! Read/write access to a project's event log.
//!
//! Queries are built from an [`EventFilter`] (equality, `>=`/`<` on time,
//! set membership, all ANDed and scoped to one project) and always scan in
//! ascending time order.

use crate::analytics::event::{Event, EventType};
use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::Connection;

/// Optional event columns that can be filtered on or projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    AnonUserId,
    SessionId,
    Url,
    ExpId,
    Variant,
    ButtonId,
    Goal,
    Meta,
}

impl Field {
    pub const ALL: [Self; 8] = [
        Self::AnonUserId,
        Self::SessionId,
        Self::Url,
        Self::ExpId,
        Self::Variant,
        Self::ButtonId,
        Self::Goal,
        Self::Meta,
    ];

    const fn column(self) -> &'static str {
        match self {
            Self::AnonUserId => "anon_user_id",
            Self::SessionId => "session_id",
            Self::Url => "url",
            Self::ExpId => "exp_id",
            Self::Variant => "variant",
            Self::ButtonId => "button_id",
            Self::Goal => "goal",
            Self::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Eq(&'static str, String),
    In(&'static str, Vec<String>),
    AtLeast(i64),
    Before(i64),
}

/// Conjunction of predicates over one project's events.
#[derive(Debug, Clone)]
pub struct EventFilter {
    project_id: String,
    predicates: Vec<Predicate>,
}

impl EventFilter {
    /// Match every event of `project_id`.
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            predicates: Vec::new(),
        }
    }

    /// Events of `kind`, under any of its spellings.
    #[must_use]
    pub fn of_type(mut self, kind: EventType) -> Self {
        let names = kind.spellings().iter().map(|s| (*s).to_string()).collect();
        self.predicates.push(Predicate::In("type", names));
        self
    }

    /// Events at or after `ts`.
    #[must_use]
    pub fn since(mut self, ts: DateTime<Utc>) -> Self {
        self.predicates
            .push(Predicate::AtLeast(ts.timestamp_millis()));
        self
    }

    /// Events strictly before `ts`.
    #[must_use]
    pub fn before(mut self, ts: DateTime<Utc>) -> Self {
        self.predicates.push(Predicate::Before(ts.timestamp_millis()));
        self
    }

    /// Raw epoch-millisecond bounds, as sent by API clients.
    #[must_use]
    pub fn since_ms(mut self, ms: i64) -> Self {
        self.predicates.push(Predicate::AtLeast(ms));
        self
    }

    #[must_use]
    pub fn before_ms(mut self, ms: i64) -> Self {
        self.predicates.push(Predicate::Before(ms));
        self
    }

    #[must_use]
    pub fn eq(mut self, field: Field, value: impl Into<String>) -> Self {
        self.predicates
            .push(Predicate::Eq(field.column(), value.into()));
        self
    }

    /// `field IN values`. An empty list matches nothing.
    #[must_use]
    pub fn any_of(mut self, field: Field, values: Vec<String>) -> Self {
        self.predicates.push(Predicate::In(field.column(), values));
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["project_id = ?".to_string()];
        let mut params = vec![Value::Text(self.project_id.clone())];

        for predicate in &self.predicates {
            match predicate {
                Predicate::Eq(col, value) => {
                    clauses.push(format!("{col} = ?"));
                    params.push(Value::Text(value.clone()));
                }
                Predicate::In(_, values) if values.is_empty() => {
                    clauses.push("FALSE".to_string());
                }
                Predicate::In(col, values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{col} IN ({marks})"));
                    params.extend(values.iter().cloned().map(Value::Text));
                }
                Predicate::AtLeast(ms) => {
                    clauses.push("timestamp_ms >= ?".to_string());
                    params.push(Value::BigInt(*ms));
                }
                Predicate::Before(ms) => {
                    clauses.push("timestamp_ms < ?".to_string());
                    params.push(Value::BigInt(*ms));
                }
            }
        }

        (clauses.join(" AND "), params)
    }
}

/// Projection and bound for [`query_events`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    fields: Vec<Field>,
    limit: Option<usize>,
}

impl QueryOptions {
    /// Every column, no row limit.
    pub fn all() -> Self {
        Self {
            fields: Field::ALL.to_vec(),
            limit: None,
        }
    }

    /// Only `fields` are loaded; the others come back as `None`. Type and
    /// timestamp are always loaded.
    pub fn fields(fields: &[Field]) -> Self {
        Self {
            fields: fields.to_vec(),
            limit: None,
        }
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Server-side count of matching events.
pub fn count_events(conn: &Connection, filter: &EventFilter) -> Result<u64, duckdb::Error> {
    let (clause, params) = filter.where_clause();
    let mut stmt = conn.prepare(&format!("SELECT COUNT(*) FROM events WHERE {clause}"))?;
    let count: u64 = stmt.query_row(duckdb::params_from_iter(params), |row| row.get(0))?;
    Ok(count)
}

/// Matching events in ascending time order.
///
/// Rows with a type this build does not know are skipped; an unreadable
/// timestamp is replaced by the current time.
pub fn query_events(
    conn: &Connection,
    filter: &EventFilter,
    options: &QueryOptions,
) -> Result<Vec<Event>, duckdb::Error> {
    let (clause, mut params) = filter.where_clause();
    let columns = Field::ALL
        .iter()
        .map(|f| {
            if options.fields.contains(f) {
                f.column().to_string()
            } else {
                format!("CAST(NULL AS VARCHAR) AS {}", f.column())
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT type, timestamp_ms, {columns} FROM events WHERE {clause}
         ORDER BY timestamp_ms ASC, seq ASC"
    );
    if let Some(limit) = options.limit {
        sql.push_str(" LIMIT ?");
        params.push(Value::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), |row| {
            let type_name: String = row.get(0)?;
            let Some(kind) = EventType::parse(&type_name) else {
                tracing::debug!(event_type = %type_name, "Skipping event of unknown type");
                return Ok(None);
            };
            let meta: Option<String> = row.get(9)?;
            Ok(Some(Event {
                kind,
                timestamp: timestamp_or_now(row.get(1)?),
                anon_user_id: row.get(2)?,
                session_id: row.get(3)?,
                url: row.get(4)?,
                exp_id: row.get(5)?,
                variant: row.get(6)?,
                button_id: row.get(7)?,
                goal: row.get(8)?,
                meta: meta.and_then(|m| serde_json::from_str(&m).ok()),
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let events = rows.into_iter().flatten().collect();
    Ok(events)
}

fn timestamp_or_now(ts_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts_ms).unwrap_or_else(|| {
        tracing::debug!(ts_ms, "Unreadable event timestamp, using now");
        Utc::now()
    })
}

/// Append one event to `project_id`'s log under its canonical type name.
pub fn insert_event(
    conn: &Connection,
    project_id: &str,
    event: &Event,
) -> Result<(), duckdb::Error> {
    let meta = event.meta.as_ref().map(serde_json::Value::to_string);
    conn.execute(
        "INSERT INTO events (project_id, type, timestamp_ms, anon_user_id, session_id,
         url, exp_id, variant, button_id, goal, meta)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            project_id,
            event.kind.as_str(),
            event.timestamp.timestamp_millis(),
            event.anon_user_id,
            event.session_id,
            event.url,
            event.exp_id,
            event.variant,
            event.button_id,
            event.goal,
            meta,
        ],
    )?;
    Ok(())
}
