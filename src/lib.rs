//! CRM Pulse: lead records, sales tallies and chart-ready traffic reports
//! served over HTTP from an embedded DuckDB store.

pub mod analytics;
pub mod api;
pub mod config;
pub mod ingest;
pub mod server;
pub mod storage;
