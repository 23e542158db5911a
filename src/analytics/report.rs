use crate::analytics::aggregate::Aggregation;
use crate::analytics::delta::series_delta_pct;
use crate::analytics::ranking::{TopPage, TOP_LIMIT};
use crate::analytics::segment::{SegmentRow, UserSegments};
use crate::analytics::window::Window;
use serde::Serialize;

/// Counts fetched with server-side aggregate queries for the overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlineCounts {
    pub page_views: u64,
    pub cta_clicks: u64,
    pub active_experiments: u64,
}

/// `GET /api/overview` payload.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub days: u32,
    pub totals: OverviewTotals,
    pub charts: OverviewCharts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewTotals {
    pub total_users: u64,
    pub total_page_views: u64,
    pub total_cta_clicks: u64,
    pub total_sessions: u64,
    pub active_experiments: u64,
    pub conversion_rate_sessions: f64,
    pub conversion_rate_users: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewCharts {
    pub page_views: ComparedSeries,
    pub sessions: ComparedSeries,
}

/// A current-period series with its previous-period counterpart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedSeries {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
    pub prev: Vec<u64>,
    pub delta_pct: Option<f64>,
}

impl ComparedSeries {
    fn new(labels: &[String], data: Vec<u64>, prev: Vec<u64>) -> Self {
        let delta_pct = series_delta_pct(&data, &prev);
        Self {
            labels: labels.to_vec(),
            data,
            prev,
            delta_pct,
        }
    }
}

/// `GET /api/users` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersReport {
    pub days: u32,
    pub labels: Vec<String>,
    pub unique_users_data: Vec<u64>,
    pub total_sessions_data: Vec<u64>,
    pub prev_unique_users_data: Vec<u64>,
    pub prev_total_sessions_data: Vec<u64>,
    pub deltas: UsersDeltas,
    pub total_unique_users: u64,
    pub total_sessions: u64,
    pub new_users: u64,
    pub returning_users: u64,
    pub user_segments: Vec<SegmentRow>,
    pub top_pages: Vec<TopPage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersDeltas {
    pub users_pct: Option<f64>,
    pub sessions_pct: Option<f64>,
}

/// Clicks per 100 of `base`, or 0 when `base` is 0.
fn rate(clicks: u64, base: u64) -> f64 {
    if base == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let r = clicks as f64 / base as f64 * 100.0;
    r
}

/// Compose the overview payload.
pub fn assemble_overview(
    window: &Window,
    agg: &Aggregation,
    counts: HeadlineCounts,
) -> OverviewReport {
    let total_users = agg.total_users();
    let total_sessions = agg.total_sessions();

    OverviewReport {
        days: window.days,
        totals: OverviewTotals {
            total_users,
            total_page_views: counts.page_views,
            total_cta_clicks: counts.cta_clicks,
            total_sessions,
            active_experiments: counts.active_experiments,
            conversion_rate_sessions: rate(counts.cta_clicks, total_sessions),
            conversion_rate_users: rate(counts.cta_clicks, total_users),
        },
        charts: OverviewCharts {
            page_views: ComparedSeries::new(
                &window.labels_curr,
                agg.current.page_view_series(&window.labels_curr),
                agg.previous.page_view_series(&window.labels_prev),
            ),
            sessions: ComparedSeries::new(
                &window.labels_curr,
                agg.current.session_series(&window.labels_curr),
                agg.previous.session_series(&window.labels_prev),
            ),
        },
    }
}

/// Compose the users payload.
pub fn assemble_users(window: &Window, agg: &Aggregation, segments: UserSegments) -> UsersReport {
    let unique_users_data = agg.current.user_series(&window.labels_curr);
    let total_sessions_data = agg.current.session_series(&window.labels_curr);
    let prev_unique_users_data = agg.previous.user_series(&window.labels_prev);
    let prev_total_sessions_data = agg.previous.session_series(&window.labels_prev);

    UsersReport {
        days: window.days,
        labels: window.labels_curr.clone(),
        deltas: UsersDeltas {
            users_pct: series_delta_pct(&unique_users_data, &prev_unique_users_data),
            sessions_pct: series_delta_pct(&total_sessions_data, &prev_total_sessions_data),
        },
        unique_users_data,
        total_sessions_data,
        prev_unique_users_data,
        prev_total_sessions_data,
        total_unique_users: segments.total,
        total_sessions: agg.total_sessions(),
        new_users: segments.new_users,
        returning_users: segments.returning_users,
        user_segments: segments.rows(),
        top_pages: agg.pages.top(TOP_LIMIT),
    }
}
