use crate::api::analytics::validate_project_id;
use crate::api::auth::Actor;
use crate::api::blocking;
use crate::api::errors::ApiError;
use crate::server::AppState;
use crate::storage::experiments::{self, ExperimentEntry};
use crate::storage::leads::{self, Lead, LeadPatch, NewLead};
use crate::storage::sales::{self, SalesSummary};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_DOC_ID_LEN: usize = 256;

/// `PATCH /api/leads/{id}` body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchRequest {
    pub patch: LeadPatch,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn validate_doc_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() || id.len() > MAX_DOC_ID_LEN || id.chars().any(char::is_control) {
        return Err(ApiError::BadRequest(format!("invalid document id {id:?}")));
    }
    Ok(())
}

/// GET /api/leads — Leads that have not been deleted, oldest first.
pub async fn list_leads(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Lead>>, ApiError> {
    let leads = blocking(&state.db, |conn| leads::list_leads(conn)).await?;
    Ok(Json(leads))
}

/// GET /api/leads/{id}
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lead>, ApiError> {
    validate_doc_id(&id)?;
    blocking(&state.db, move |conn| leads::get_lead(conn, &id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// POST /api/leads — Create a lead owned by the calling user.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let lead = json_body(payload)?;
    let now_ms = Utc::now().timestamp_millis();
    let id = blocking(&state.db, move |conn| {
        leads::create_lead(conn, &lead, &actor, now_ms)
    })
    .await?;

    tracing::info!(lead = %id, "Lead created");
    Ok(Json(json!({ "ok": true, "id": id })))
}

/// PATCH /api/leads/{id} — Merge the supplied fields into a lead.
pub async fn patch_lead(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    payload: Result<Json<PatchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    validate_doc_id(&id)?;
    let PatchRequest { patch } = json_body(payload)?;
    let now_ms = Utc::now().timestamp_millis();
    blocking(&state.db, move |conn| {
        leads::apply_patch(conn, &id, &patch, &actor, now_ms)
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/leads/{id} — Soft delete.
pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_doc_id(&id)?;
    let now_ms = Utc::now().timestamp_millis();
    tracing::info!(lead = %id, actor = %actor, "Lead deleted");
    blocking(&state.db, move |conn| leads::soft_delete(conn, &id, now_ms)).await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/sales — All tally documents with per-metric totals.
pub async fn get_sales(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SalesSummary>, ApiError> {
    let summary = blocking(&state.db, |conn| sales::summarize(conn)).await?;
    Ok(Json(summary))
}

/// PUT /api/sales/{id} — Replace one tally document.
pub async fn put_sales(
    State(state): State<Arc<AppState>>,
    Actor(_actor): Actor,
    Path(id): Path<String>,
    payload: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    validate_doc_id(&id)?;
    let data = json_body(payload)?;
    blocking(&state.db, move |conn| sales::replace_tally(conn, &id, &data)).await?;
    Ok(Json(json!({ "ok": true })))
}

/// PUT /api/projects/{projectId}/experiments/{expId} — Register or update an experiment.
pub async fn put_experiment(
    State(state): State<Arc<AppState>>,
    Actor(_actor): Actor,
    Path((project_id, exp_id)): Path<(String, String)>,
    payload: Result<Json<ExperimentEntry>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    validate_project_id(&project_id)?;
    validate_doc_id(&exp_id)?;
    let entry = json_body(payload)?;
    blocking(&state.db, move |conn| {
        experiments::upsert_experiment(conn, &project_id, &exp_id, &entry)
    })
    .await?;
    Ok(Json(json!({ "ok": true })))
}
