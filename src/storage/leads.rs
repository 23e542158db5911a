use duckdb::{Connection, OptionalExt, Row};
use serde::{Deserialize, Serialize};

/// Status written when a lead is created.
pub const ACTIVE_STATUS: &str = "Active";
/// Status written by a soft delete.
pub const DELETED_STATUS: &str = "Deleted";

const DEFAULT_PRIORITY: &str = "First Class";
const DEFAULT_PHASE: &str = "Opening";

const LEAD_COLUMNS: &str = "id, company_name, contact_name, email, phone, account_manager,
    lead_value, priority, company_size, industry, contact_method, subscription_type,
    current_phase, status, website, notes, created_at, created_by, updated_at, updated_by,
    deleted_at";

/// A CRM lead. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub account_manager: Option<String>,
    pub lead_value: Option<f64>,
    pub priority: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub contact_method: Option<String>,
    pub subscription_type: Option<String>,
    pub current_phase: Option<String>,
    pub status: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<i64>,
    pub created_by: Option<String>,
    pub updated_at: Option<i64>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<i64>,
}

/// Fields an admin supplies when creating a lead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub account_manager: Option<String>,
    pub priority: Option<String>,
    pub current_phase: Option<String>,
}

/// Partial update of the editable lead fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeadPatch {
    pub account_manager: Option<String>,
    pub lead_value: Option<f64>,
    pub priority: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
    pub contact_method: Option<String>,
    pub subscription_type: Option<String>,
    pub current_phase: Option<String>,
    pub status: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Insert a new lead and return its generated id.
pub fn create_lead(
    conn: &Connection,
    lead: &NewLead,
    actor: &str,
    now_ms: i64,
) -> Result<String, duckdb::Error> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    conn.execute(
        "INSERT INTO leads (id, company_name, contact_name, email, phone, account_manager,
         priority, current_phase, status, created_at, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            id,
            text(&lead.company_name),
            text(&lead.contact_name),
            text(&lead.email),
            text(&lead.phone),
            text(&lead.account_manager),
            lead.priority.as_deref().unwrap_or(DEFAULT_PRIORITY),
            lead.current_phase.as_deref().unwrap_or(DEFAULT_PHASE),
            ACTIVE_STATUS,
            now_ms,
            actor,
        ],
    )?;
    Ok(id)
}

/// Merge `patch` into lead `id`, creating the row if it does not exist.
/// Fields present in the patch overwrite; absent ones are left alone.
pub fn apply_patch(
    conn: &Connection,
    id: &str,
    patch: &LeadPatch,
    actor: &str,
    now_ms: i64,
) -> Result<(), duckdb::Error> {
    conn.execute(
        "INSERT INTO leads (id, account_manager, lead_value, priority, company_size, industry,
         contact_method, subscription_type, current_phase, status, website, notes,
         updated_at, updated_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             account_manager = COALESCE(excluded.account_manager, account_manager),
             lead_value = COALESCE(excluded.lead_value, lead_value),
             priority = COALESCE(excluded.priority, priority),
             company_size = COALESCE(excluded.company_size, company_size),
             industry = COALESCE(excluded.industry, industry),
             contact_method = COALESCE(excluded.contact_method, contact_method),
             subscription_type = COALESCE(excluded.subscription_type, subscription_type),
             current_phase = COALESCE(excluded.current_phase, current_phase),
             status = COALESCE(excluded.status, status),
             website = COALESCE(excluded.website, website),
             notes = COALESCE(excluded.notes, notes),
             updated_at = excluded.updated_at,
             updated_by = excluded.updated_by",
        duckdb::params![
            id,
            patch.account_manager,
            patch.lead_value,
            patch.priority,
            patch.company_size,
            patch.industry,
            patch.contact_method,
            patch.subscription_type,
            patch.current_phase,
            patch.status,
            patch.website,
            patch.notes,
            now_ms,
            actor,
        ],
    )?;
    Ok(())
}

/// Mark lead `id` deleted without removing the row.
pub fn soft_delete(conn: &Connection, id: &str, now_ms: i64) -> Result<(), duckdb::Error> {
    conn.execute(
        "INSERT INTO leads (id, status, deleted_at) VALUES (?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
             status = excluded.status,
             deleted_at = excluded.deleted_at",
        duckdb::params![id, DELETED_STATUS, now_ms],
    )?;
    Ok(())
}

/// Fetch one lead, deleted or not.
pub fn get_lead(conn: &Connection, id: &str) -> Result<Option<Lead>, duckdb::Error> {
    let mut stmt = conn.prepare(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"))?;
    stmt.query_row([id], lead_from_row).optional()
}

/// Leads that have not been soft-deleted, oldest first.
pub fn list_leads(conn: &Connection) -> Result<Vec<Lead>, duckdb::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads WHERE deleted_at IS NULL
         ORDER BY created_at ASC NULLS LAST, id ASC"
    ))?;
    let leads = stmt
        .query_map([], lead_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(leads)
}

fn lead_from_row(row: &Row<'_>) -> Result<Lead, duckdb::Error> {
    Ok(Lead {
        id: row.get(0)?,
        company_name: row.get(1)?,
        contact_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        account_manager: row.get(5)?,
        lead_value: row.get(6)?,
        priority: row.get(7)?,
        company_size: row.get(8)?,
        industry: row.get(9)?,
        contact_method: row.get(10)?,
        subscription_type: row.get(11)?,
        current_phase: row.get(12)?,
        status: row.get(13)?,
        website: row.get(14)?,
        notes: row.get(15)?,
        created_at: row.get(16)?,
        created_by: row.get(17)?,
        updated_at: row.get(18)?,
        updated_by: row.get(19)?,
        deleted_at: row.get(20)?,
    })
}
