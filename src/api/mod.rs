pub mod analytics;
pub mod auth;
pub mod crm;
pub mod errors;

use crate::api::errors::ApiError;
use crate::storage::Database;
use duckdb::Connection;

/// Run `f` against the shared connection on the blocking pool.
pub(crate) async fn blocking<T, F>(db: &Database, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Connection) -> Result<T, duckdb::Error> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = db.conn().lock();
        f(&mut conn)
    })
    .await??;
    Ok(result)
}
