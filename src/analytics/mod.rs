//! Windowed traffic analytics: per-day bucketing, period-over-period deltas,
//! new/returning segmentation and top-page ranking.
//!
//! Everything here is pure and request-scoped; store access lives in
//! [`crate::storage`].

pub mod aggregate;
pub mod delta;
pub mod event;
pub mod experiments;
pub mod ranking;
pub mod report;
pub mod segment;
pub mod window;
