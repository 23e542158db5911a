use crate::analytics::event::Event;
use crate::analytics::ranking::{normalize_path, EntityTally};
use crate::analytics::window::{day_key, Window};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};

/// Per-day accumulators for one period (current or previous).
#[derive(Debug, Default, Clone)]
pub struct PeriodBuckets {
    page_views: HashMap<String, u64>,
    sessions: HashMap<String, HashSet<String>>,
    users: HashMap<String, HashSet<String>>,
}

impl PeriodBuckets {
    /// Page-view counts aligned to `labels`; missing days are 0.
    pub fn page_view_series(&self, labels: &[String]) -> Vec<u64> {
        labels
            .iter()
            .map(|day| self.page_views.get(day).copied().unwrap_or(0))
            .collect()
    }

    /// Distinct sessions per day aligned to `labels`.
    pub fn session_series(&self, labels: &[String]) -> Vec<u64> {
        distinct_series(&self.sessions, labels)
    }

    /// Distinct users per day aligned to `labels`.
    pub fn user_series(&self, labels: &[String]) -> Vec<u64> {
        distinct_series(&self.users, labels)
    }
}

fn distinct_series(map: &HashMap<String, HashSet<String>>, labels: &[String]) -> Vec<u64> {
    labels
        .iter()
        .map(|day| map.get(day).map_or(0, |set| set.len() as u64))
        .collect()
}

/// Everything one pass over a window's events produces.
#[derive(Debug, Default, Clone)]
pub struct Aggregation {
    pub current: PeriodBuckets,
    pub previous: PeriodBuckets,
    /// Users of the current period with their first in-window timestamp,
    /// in first-seen order.
    users_first_seen: Vec<(String, DateTime<Utc>)>,
    users_seen: HashSet<String>,
    sessions: HashSet<String>,
    /// Pages touched in the current period.
    pub pages: EntityTally,
}

impl Aggregation {
    /// Distinct users in the current period.
    pub fn total_users(&self) -> u64 {
        self.users_first_seen.len() as u64
    }

    /// Distinct sessions in the current period.
    pub fn total_sessions(&self) -> u64 {
        self.sessions.len() as u64
    }

    /// Current-period user ids, in the order they were first seen.
    pub fn user_ids(&self) -> Vec<String> {
        self.users_first_seen
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Bucket `events` into current/previous periods and local days.
///
/// Events are expected in ascending timestamp order and no older than
/// `window.previous_start`. Only page-view events add to page-view counts;
/// events of any type feed the session and user sets. Missing ids are
/// excluded from every unique set but the event still counts.
pub fn aggregate<Tz: TimeZone>(events: &[Event], window: &Window, tz: &Tz) -> Aggregation {
    let mut agg = Aggregation::default();

    for event in events {
        let day = day_key(event.timestamp, tz);
        let is_current = window.is_current(event.timestamp);
        let user = event.anon_user_id.as_deref();
        let session = event.session_id.as_deref();

        let period = if is_current {
            &mut agg.current
        } else {
            &mut agg.previous
        };
        if event.kind.is_page_view() {
            *period.page_views.entry(day.clone()).or_insert(0) += 1;
        }
        let day_sessions = period.sessions.entry(day.clone()).or_default();
        if let Some(session) = session {
            day_sessions.insert(session.to_string());
        }
        if let Some(user) = user {
            period
                .users
                .entry(day)
                .or_default()
                .insert(user.to_string());
        }

        if is_current {
            if let Some(session) = session {
                agg.sessions.insert(session.to_string());
            }
            if let Some(user) = user {
                if agg.users_seen.insert(user.to_string()) {
                    agg.users_first_seen
                        .push((user.to_string(), event.timestamp));
                }
            }
            agg.pages
                .touch(&normalize_path(event.url.as_deref()), user, session);
        }
    }

    agg
}
