use crate::analytics::event::{non_empty, Event, EventType};
use crate::api::analytics::validate_project_id;
use crate::api::auth::validate_origin;
use crate::api::blocking;
use crate::api::errors::ApiError;
use crate::server::AppState;
use crate::storage::events;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

const MAX_ID_LEN: usize = 256;
const MAX_URL_LEN: usize = 2048;
const MAX_META_LEN: usize = 4096;

/// Inbound event as sent by the tracking snippet.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub project_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Epoch milliseconds or an RFC 3339 string.
    pub timestamp: Option<serde_json::Value>,
    pub anon_user_id: Option<String>,
    pub session_id: Option<String>,
    pub url: Option<String>,
    pub exp_id: Option<String>,
    pub variant: Option<String>,
    pub button_id: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl EventPayload {
    /// Map the raw payload onto the event schema.
    ///
    /// Returns `None` for an unknown event type. A missing or unreadable
    /// timestamp becomes `now`.
    pub fn normalize(self, now: DateTime<Utc>) -> Option<Event> {
        let kind = EventType::parse(self.event_type.trim())?;
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(parse_timestamp)
            .unwrap_or(now);

        let meta = self
            .meta
            .filter(|m| !m.is_null() && m.to_string().len() <= MAX_META_LEN);
        let goal = meta
            .as_ref()
            .and_then(|m| m.get("goal"))
            .and_then(serde_json::Value::as_str)
            .map(|g| sanitize_string(g, MAX_ID_LEN));

        Some(Event {
            kind,
            timestamp,
            anon_user_id: clean_id(self.anon_user_id),
            session_id: clean_id(self.session_id),
            url: self
                .url
                .map(|u| sanitize_string(&u, MAX_URL_LEN))
                .and_then(non_empty),
            exp_id: clean_id(self.exp_id),
            variant: clean_id(self.variant),
            button_id: clean_id(self.button_id),
            goal: goal.and_then(non_empty),
            meta,
        })
    }
}

fn clean_id(raw: Option<String>) -> Option<String> {
    raw.map(|s| sanitize_string(s.trim(), MAX_ID_LEN))
        .and_then(non_empty)
}

fn parse_timestamp(raw: &serde_json::Value) -> Option<DateTime<Utc>> {
    match raw {
        serde_json::Value::Number(n) => {
            #[allow(clippy::cast_possible_truncation)]
            let ms = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(ms)
        }
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// POST /api/event — Record one analytics event.
pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    if !validate_origin(origin, &state.allowed_origins) {
        tracing::debug!(origin, "Rejected event from disallowed origin");
        return Err(ApiError::Forbidden);
    }

    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    validate_project_id(&payload.project_id)?;

    let project_id = payload.project_id.clone();
    let event_type = payload.event_type.clone();
    let event = payload
        .normalize(Utc::now())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown event type {event_type:?}")))?;

    blocking(&state.db, move |conn| {
        events::insert_event(conn, &project_id, &event)
    })
    .await?;

    Ok(StatusCode::ACCEPTED)
}

/// Strip control characters and truncate to `max_len` characters.
fn sanitize_string(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect()
}
