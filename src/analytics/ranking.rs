use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Number of entries kept by [`EntityTally::top`].
pub const TOP_LIMIT: usize = 20;

/// Distinct users and sessions seen for one entity.
#[derive(Debug, Default, Clone)]
struct EntityBucket {
    users: HashSet<String>,
    sessions: HashSet<String>,
}

/// Per-entity distinct-user/session accumulator that remembers the order in
/// which entities were first touched.
#[derive(Debug, Default, Clone)]
pub struct EntityTally {
    order: Vec<String>,
    buckets: HashMap<String, EntityBucket>,
}

/// One ranked page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub page: String,
    pub unique_users: u64,
    pub total_sessions: u64,
}

impl EntityTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one hit on `key`. Absent ids create the bucket but add nothing
    /// to its sets.
    pub fn touch(&mut self, key: &str, user: Option<&str>, session: Option<&str>) {
        if !self.buckets.contains_key(key) {
            self.order.push(key.to_string());
        }
        let bucket = self.buckets.entry(key.to_string()).or_default();
        if let Some(user) = user {
            bucket.users.insert(user.to_string());
        }
        if let Some(session) = session {
            bucket.sessions.insert(session.to_string());
        }
    }

    /// Entities by distinct-user count, descending, truncated to `limit`.
    /// Ties keep first-touch order.
    pub fn top(&self, limit: usize) -> Vec<TopPage> {
        let mut ranked: Vec<TopPage> = self
            .order
            .iter()
            .filter_map(|key| {
                self.buckets.get(key).map(|b| TopPage {
                    page: key.clone(),
                    unique_users: b.users.len() as u64,
                    total_sessions: b.sessions.len() as u64,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.unique_users.cmp(&a.unique_users));
        ranked.truncate(limit);
        ranked
    }
}

/// Reduce a URL to its path: scheme, host, query string and fragment are
/// dropped. Missing or empty input maps to `/`.
pub fn normalize_path(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "/".to_string();
    };
    let without_query = raw.split(['?', '#']).next().unwrap_or("");
    let path = match without_query.find("://") {
        Some(pos) => {
            let rest = &without_query[pos + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => without_query,
    };
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_full_url() {
        assert_eq!(
            normalize_path(Some("https://example.com/pricing?plan=pro#faq")),
            "/pricing"
        );
    }

    #[test]
    fn test_normalize_path_host_only() {
        assert_eq!(normalize_path(Some("https://example.com")), "/");
        assert_eq!(normalize_path(Some("https://example.com?x=1")), "/");
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(normalize_path(Some("/blog/post?id=3")), "/blog/post");
        assert_eq!(normalize_path(Some("about")), "/about");
    }

    #[test]
    fn test_normalize_path_missing() {
        assert_eq!(normalize_path(None), "/");
        assert_eq!(normalize_path(Some("")), "/");
        assert_eq!(normalize_path(Some("#top")), "/");
    }

    #[test]
    fn test_rank_by_unique_users() {
        let mut tally = EntityTally::new();
        tally.touch("/a", Some("u1"), Some("s1"));
        tally.touch("/b", Some("u1"), Some("s1"));
        tally.touch("/b", Some("u2"), Some("s2"));
        tally.touch("/b", Some("u2"), Some("s3"));

        let top = tally.top(TOP_LIMIT);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].page, "/b");
        assert_eq!(top[0].unique_users, 2);
        assert_eq!(top[0].total_sessions, 3);
        assert_eq!(top[1].page, "/a");
    }

    #[test]
    fn test_rank_ties_keep_first_touch_order() {
        let mut tally = EntityTally::new();
        tally.touch("/z", Some("u1"), None);
        tally.touch("/m", Some("u2"), None);
        tally.touch("/a", Some("u3"), None);

        let pages: Vec<String> = tally.top(TOP_LIMIT).into_iter().map(|p| p.page).collect();
        assert_eq!(pages, vec!["/z", "/m", "/a"]);
    }

    #[test]
    fn test_anonymous_hits_create_bucket_without_ids() {
        let mut tally = EntityTally::new();
        tally.touch("/", None, None);
        let top = tally.top(TOP_LIMIT);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].unique_users, 0);
        assert_eq!(top[0].total_sessions, 0);
    }

    #[test]
    fn test_rank_truncates() {
        let mut tally = EntityTally::new();
        for i in 0..30 {
            tally.touch(&format!("/p{i}"), Some("u"), None);
        }
        assert_eq!(tally.top(usize::MAX).len(), 30);
        assert_eq!(tally.top(TOP_LIMIT).len(), TOP_LIMIT);
    }

    #[test]
    fn test_empty_tally() {
        let tally = EntityTally::new();
        assert!(tally.top(TOP_LIMIT).is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let mut tally = EntityTally::new();
        tally.touch("/", Some("u1"), Some("s1"));
        let json = serde_json::to_value(tally.top(1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "page": "/", "uniqueUsers": 1, "totalSessions": 1 }])
        );
    }
}
