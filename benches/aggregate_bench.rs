use chrono::{DateTime, Duration, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crm_pulse::analytics::aggregate::aggregate;
use crm_pulse::analytics::event::{Event, EventType};
use crm_pulse::analytics::report::assemble_users;
use crm_pulse::analytics::segment::UserSegments;
use crm_pulse::analytics::window::Window;
use crm_pulse::storage::events::{self, EventFilter, QueryOptions};
use crm_pulse::storage::Database;
use std::collections::HashSet;

fn bench_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-31T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// `n` page views spread over the 14 days before `bench_now`, oldest first.
fn make_events(n: usize) -> Vec<Event> {
    let span_ms = 14 * 86_400_000_i64;
    let step = span_ms / i64::try_from(n).unwrap_or(1).max(1);
    let start = bench_now() - Duration::milliseconds(span_ms);
    (0..n)
        .map(|i| {
            let offset = step * i64::try_from(i).unwrap_or(0);
            Event::new(EventType::PageView, start + Duration::milliseconds(offset))
                .with_user(format!("user-{}", i % 1_000))
                .with_session(format!("session-{}", i % 3_000))
                .with_url(format!("/page-{}?ref={}", i % 100, i % 7))
        })
        .collect()
}

/// In-memory aggregation pass, isolated from the store.
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let window = Window::build(bench_now(), 7, &Utc);

    for size in [1_000, 10_000, 100_000] {
        let events = make_events(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| aggregate(events, &window, &Utc));
        });
    }

    group.finish();
}

/// Aggregation plus payload assembly and serialization.
fn bench_users_report(c: &mut Criterion) {
    let window = Window::build(bench_now(), 7, &Utc);
    let events = make_events(10_000);

    c.bench_function("users_report_10k", |b| {
        b.iter(|| {
            let agg = aggregate(&events, &window, &Utc);
            let segments = UserSegments::classify(agg.total_users(), &HashSet::new());
            serde_json::to_vec(&assemble_users(&window, &agg, segments)).unwrap()
        });
    });
}

/// Page-view scan through the store on a warm connection.
fn bench_query_page_views(c: &mut Criterion) {
    let db = Database::open_in_memory().unwrap();
    {
        let conn = db.conn().lock();
        for event in make_events(10_000) {
            events::insert_event(&conn, "bench", &event).unwrap();
        }
    }
    let window = Window::build(bench_now(), 7, &Utc);
    let filter = EventFilter::project("bench")
        .of_type(EventType::PageView)
        .since(window.previous_start);

    c.bench_function("query_page_views_10k", |b| {
        b.iter(|| {
            let conn = db.conn().lock();
            events::query_events(&conn, &filter, &QueryOptions::all()).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate,
    bench_users_report,
    bench_query_page_views
);
criterion_main!(benches);
