use duckdb::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// One tally document: metric name to value. Non-numeric values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRow {
    pub id: String,
    pub data: BTreeMap<String, Option<f64>>,
}

/// All tally documents plus per-metric sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub rows: Vec<SalesRow>,
    pub totals: BTreeMap<String, f64>,
}

/// Replace tally document `id` with `data`. Numbers are stored as-is, any
/// other JSON value is stored as null.
pub fn replace_tally(
    conn: &mut Connection,
    id: &str,
    data: &BTreeMap<String, serde_json::Value>,
) -> Result<(), duckdb::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM sales WHERE id = ?", [id])?;
    for (metric, value) in data {
        tx.execute(
            "INSERT INTO sales (id, metric, value) VALUES (?, ?, ?)",
            duckdb::params![id, metric, value.as_f64()],
        )?;
    }
    tx.commit()
}

/// Every tally document ordered by id, with totals summed per metric.
pub fn summarize(conn: &Connection) -> Result<SalesSummary, duckdb::Error> {
    let mut stmt = conn.prepare("SELECT id, metric, value FROM sales ORDER BY id, metric")?;
    let entries = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows: Vec<SalesRow> = Vec::new();
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (id, metric, value) in entries {
        *totals.entry(metric.clone()).or_insert(0.0) += value.unwrap_or(0.0);
        match rows.last_mut() {
            Some(row) if row.id == id => {
                row.data.insert(metric, value);
            }
            _ => rows.push(SalesRow {
                id,
                data: BTreeMap::from([(metric, value)]),
            }),
        }
    }

    Ok(SalesSummary { rows, totals })
}
