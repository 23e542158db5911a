//! Dashboard analytics endpoints: overview, users and experiments.
//!
//! Each handler resolves its window, issues store queries on the blocking
//! pool and hands the rows to the pure `analytics` core.

use crate::analytics::aggregate::aggregate;
use crate::analytics::event::{Event, EventType};
use crate::analytics::experiments::{
    ExperimentRange, ExperimentResult, ExperimentSpec, ExperimentsReport, ExperimentsRequest,
    VariantRow,
};
use crate::analytics::report::{
    assemble_overview, assemble_users, HeadlineCounts, OverviewReport, UsersReport,
};
use crate::analytics::segment::{self, UserSegments};
use crate::analytics::window::{parse_days, Window};
use crate::api::blocking;
use crate::api::errors::ApiError;
use crate::server::AppState;
use crate::storage::events::{self, EventFilter, Field, QueryOptions};
use crate::storage::{experiments, Database};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{Local, NaiveDate, Utc};
use duckdb::Connection;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Query parameters shared by the windowed endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    pub project_id: Option<String>,
    /// Kept as text so non-numeric input can be rejected explicitly.
    pub days: Option<String>,
}

impl WindowParams {
    /// Resolve the project (falling back to `default_project`) and window size.
    pub fn resolve(&self, default_project: &str) -> Result<(String, u32), ApiError> {
        let project_id = self
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(default_project)
            .to_string();
        validate_project_id(&project_id)?;
        let days = parse_days(self.days.as_deref())?;
        Ok((project_id, days))
    }
}

/// Validate that a project id is safe to use as a tenant key.
///
/// - Must be non-empty and at most 256 bytes.
/// - Must contain only alphanumeric ASCII characters or `.`, `-`, `_`, `:`.
///
/// Shared by the dashboard handlers and ingestion so that every project an
/// event can be written to is also queryable.
pub fn validate_project_id(project_id: &str) -> Result<(), ApiError> {
    if project_id.is_empty() {
        return Err(ApiError::BadRequest(
            "projectId must not be empty".to_string(),
        ));
    }
    if project_id.len() > 256 {
        return Err(ApiError::BadRequest(
            "projectId must be at most 256 characters".to_string(),
        ));
    }
    let valid = project_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'));
    if !valid {
        return Err(ApiError::BadRequest(
            "projectId may only contain alphanumeric characters, '.', '-', '_', ':'".to_string(),
        ));
    }
    Ok(())
}

fn window_params(
    params: Result<Query<WindowParams>, QueryRejection>,
    default_project: &str,
) -> Result<(String, Window), ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (project_id, days) = params.resolve(default_project)?;
    Ok((project_id, Window::build(Utc::now(), days, &Local)))
}

/// Page views since the start of the previous window, with just the fields
/// the aggregator reads.
async fn load_page_views(
    db: &Database,
    project_id: &str,
    window: &Window,
) -> Result<Vec<Event>, ApiError> {
    let filter = EventFilter::project(project_id)
        .of_type(EventType::PageView)
        .since(window.previous_start);
    let options = QueryOptions::fields(&[Field::AnonUserId, Field::SessionId, Field::Url]);
    blocking(db, move |conn| events::query_events(conn, &filter, &options)).await
}

/// GET /api/overview — Headline totals plus page-view and session series.
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<OverviewReport>, ApiError> {
    let (project_id, window) = window_params(params, &state.default_project)?;

    let page_view_filter = EventFilter::project(&project_id)
        .of_type(EventType::PageView)
        .since(window.current_start);
    let click_filter = EventFilter::project(&project_id)
        .of_type(EventType::CtaClick)
        .since(window.current_start);

    let (page_views, cta_clicks, active_experiments) = tokio::try_join!(
        blocking(&state.db, move |conn| events::count_events(conn, &page_view_filter)),
        blocking(&state.db, move |conn| events::count_events(conn, &click_filter)),
        async { Ok::<_, ApiError>(active_experiment_count(&state.db, &project_id).await) },
    )?;

    let page_view_events = load_page_views(&state.db, &project_id, &window).await?;
    let agg = aggregate(&page_view_events, &window, &Local);

    tracing::debug!(
        project = %project_id,
        days = window.days,
        events = page_view_events.len(),
        "Assembled overview"
    );
    Ok(Json(assemble_overview(
        &window,
        &agg,
        HeadlineCounts {
            page_views,
            cta_clicks,
            active_experiments,
        },
    )))
}

/// The larger of the two registry counts. Degrades to 0 on failure.
async fn active_experiment_count(db: &Database, project_id: &str) -> u64 {
    let flagged_project = project_id.to_string();
    let status_project = project_id.to_string();
    let counts = tokio::try_join!(
        blocking(db, move |conn| experiments::count_flagged_active(
            conn,
            &flagged_project
        )),
        blocking(db, move |conn| experiments::count_status_active(
            conn,
            &status_project
        )),
    );
    match counts {
        Ok((flagged, by_status)) => flagged.max(by_status),
        Err(e) => {
            tracing::warn!(error = %e, project = %project_id, "Active experiment count failed, reporting 0");
            0
        }
    }
}

/// GET /api/users — Unique users, sessions, new vs returning and top pages.
pub async fn get_users(
    State(state): State<Arc<AppState>>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<UsersReport>, ApiError> {
    let (project_id, window) = window_params(params, &state.default_project)?;

    let page_view_events = load_page_views(&state.db, &project_id, &window).await?;
    let agg = aggregate(&page_view_events, &window, &Local);

    let returning = returning_users(&state.db, &project_id, &window, &agg.user_ids()).await?;
    let segments = UserSegments::classify(agg.total_users(), &returning);

    tracing::debug!(
        project = %project_id,
        days = window.days,
        users = segments.total,
        returning = segments.returning_users,
        "Assembled users report"
    );
    Ok(Json(assemble_users(&window, &agg, segments)))
}

/// Users with at least one page view before the current window.
///
/// One query per batch, all batches in flight at once. Each batch stops at
/// its first match, so this can undercount.
async fn returning_users(
    db: &Database,
    project_id: &str,
    window: &Window,
    user_ids: &[String],
) -> Result<HashSet<String>, ApiError> {
    let mut tasks = JoinSet::new();
    for batch in segment::batches(user_ids) {
        let filter = EventFilter::project(project_id)
            .of_type(EventType::PageView)
            .any_of(Field::AnonUserId, batch)
            .before(window.current_start);
        let db = db.clone();
        tasks.spawn(async move {
            blocking(&db, move |conn| {
                events::query_events(conn, &filter, &QueryOptions::fields(&[Field::AnonUserId]).limit(1))
            })
            .await
        });
    }

    let mut returning = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        for event in joined?? {
            if let Some(user) = event.anon_user_id {
                returning.insert(user);
            }
        }
    }
    Ok(returning)
}

/// POST /api/experiments — Per-variant exposure, click and conversion counts.
pub async fn post_experiments(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExperimentsRequest>, JsonRejection>,
) -> Result<Json<ExperimentsReport>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    validate_project_id(&request.project_id)?;
    validate_experiments(&request.experiments)?;
    let base = range_filter(
        EventFilter::project(&request.project_id),
        request.range.as_ref(),
    )?;

    let report = blocking(&state.db, move |conn| {
        let results = request
            .experiments
            .iter()
            .map(|exp| experiment_result(conn, &base, &request, exp))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExperimentsReport { results })
    })
    .await?;

    Ok(Json(report))
}

fn validate_experiments(specs: &[ExperimentSpec]) -> Result<(), ApiError> {
    for spec in specs {
        if spec.id.trim().is_empty() {
            return Err(ApiError::BadRequest("experiment id must not be empty".to_string()));
        }
        if spec.variants.iter().any(|v| v.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!(
                "experiment {:?} has an empty variant",
                spec.id
            )));
        }
    }
    Ok(())
}

/// Apply the optional `range` bounds. All present bounds are ANDed.
fn range_filter(
    filter: EventFilter,
    range: Option<&ExperimentRange>,
) -> Result<EventFilter, ApiError> {
    let Some(range) = range else {
        return Ok(filter);
    };
    let mut filter = filter;
    if let Some(day) = range.day.as_deref() {
        let date = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
            .map_err(|e| ApiError::BadRequest(format!("invalid range.day {day:?}: {e}")))?;
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        filter = filter.since(start).before(start + chrono::Duration::days(1));
    }
    if let Some(start_ms) = range.start_ms {
        filter = filter.since_ms(start_ms);
    }
    if let Some(end_ms) = range.end_ms {
        filter = filter.before_ms(end_ms);
    }
    Ok(filter)
}

fn experiment_result(
    conn: &Connection,
    base: &EventFilter,
    request: &ExperimentsRequest,
    exp: &ExperimentSpec,
) -> Result<ExperimentResult, duckdb::Error> {
    let rows = exp
        .variants
        .iter()
        .map(|variant| {
            let scoped = |kind| {
                base.clone()
                    .of_type(kind)
                    .eq(Field::ExpId, exp.id.as_str())
                    .eq(Field::Variant, variant.as_str())
            };

            let exposures = events::count_events(conn, &scoped(EventType::ExpExposure))?;

            let mut clicks = scoped(EventType::CtaClick);
            if let Some(button_id) = request.button_id.as_deref().filter(|b| !b.is_empty()) {
                clicks = clicks.eq(Field::ButtonId, button_id);
            }
            let clicks = events::count_events(conn, &clicks)?;

            let mut conversions = scoped(EventType::Conversion);
            if let Some(goal) = request.goal.as_deref().filter(|g| !g.is_empty()) {
                conversions = conversions.eq(Field::Goal, goal);
            }
            let conversions = events::count_events(conn, &conversions)?;

            Ok(VariantRow::new(variant.as_str(), exposures, clicks, conversions))
        })
        .collect::<Result<Vec<_>, duckdb::Error>>()?;

    Ok(ExperimentResult::from_rows(exp.id.as_str(), rows))
}
