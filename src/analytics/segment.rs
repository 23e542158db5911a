use serde::Serialize;
use std::collections::HashSet;

/// Users per existence query. Each batch is checked with a single
/// `IN`-list lookup.
pub const BATCH_SIZE: usize = 10;

const NEW_COLOR: &str = "bg-indigo-500";
const RETURNING_COLOR: &str = "bg-emerald-500";

/// Split user ids into existence-query batches, preserving order.
pub fn batches(user_ids: &[String]) -> Vec<Vec<String>> {
    user_ids.chunks(BATCH_SIZE).map(<[String]>::to_vec).collect()
}

/// New vs returning split of a window's unique users.
///
/// A user is returning when a page view of theirs exists before the window
/// starts. Each batch query stops at its first match, so a batch can mark at
/// most one user returning and the returning count is a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSegments {
    pub total: u64,
    pub new_users: u64,
    pub returning_users: u64,
}

impl UserSegments {
    /// Classify `total` unique users given the ids found before the window.
    pub fn classify(total: u64, returning: &HashSet<String>) -> Self {
        let returning_users = (returning.len() as u64).min(total);
        Self {
            total,
            new_users: total.saturating_sub(returning_users),
            returning_users,
        }
    }

    /// Chart rows for the segment breakdown.
    pub fn rows(&self) -> Vec<SegmentRow> {
        vec![
            SegmentRow {
                segment: "New",
                count: self.new_users,
                percentage: percentage(self.new_users, self.total),
                color: NEW_COLOR,
            },
            SegmentRow {
                segment: "Returning",
                count: self.returning_users,
                percentage: percentage(self.returning_users, self.total),
                color: RETURNING_COLOR,
            },
        ]
    }
}

/// One segment of the user breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRow {
    pub segment: &'static str,
    pub count: u64,
    pub percentage: u64,
    pub color: &'static str,
}

/// Integer-rounded share of `part` in `total`; 0 when `total` is 0.
pub fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let pct = (part as f64 / total as f64 * 100.0).round() as u64;
    pct
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_batches_of_ten() {
        let chunks = batches(&ids(25));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
        assert_eq!(chunks[2][0], "u20");
    }

    #[test]
    fn test_batches_empty() {
        assert!(batches(&[]).is_empty());
    }

    #[test]
    fn test_classify() {
        let seg = UserSegments::classify(4, &set(&["u1"]));
        assert_eq!(seg.returning_users, 1);
        assert_eq!(seg.new_users, 3);
    }

    #[test]
    fn test_classify_no_users() {
        let seg = UserSegments::classify(0, &HashSet::new());
        assert_eq!(seg.new_users, 0);
        assert_eq!(seg.returning_users, 0);
        assert!(seg.rows().iter().all(|r| r.percentage == 0));
    }

    #[test]
    fn test_rows() {
        let seg = UserSegments::classify(3, &set(&["a"]));
        let rows = seg.rows();
        assert_eq!(rows[0].segment, "New");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].percentage, 67);
        assert_eq!(rows[0].color, "bg-indigo-500");
        assert_eq!(rows[1].segment, "Returning");
        assert_eq!(rows[1].percentage, 33);
        assert_eq!(rows[1].color, "bg-emerald-500");
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(5, 0), 0);
    }
}
