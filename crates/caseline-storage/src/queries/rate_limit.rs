// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate-limit counters in the shared store.
//!
//! Keeping the window here instead of in process memory means the limit
//! holds across gateway instances. Each hit is one atomic
//! increment-and-expire UPSERT; the ISO timestamp format is
//! lexicographically ordered, so window comparisons stay in SQL.

use std::time::Duration;

use caseline_core::types::now_iso;
use caseline_core::CaselineError;
use rusqlite::params;

use crate::database::Database;

fn iso_before(delta: Duration) -> String {
    (chrono::Utc::now() - chrono::Duration::from_std(delta).unwrap_or_default())
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Record a hit against `key`. Returns whether the request is allowed.
///
/// A window older than `window` resets to a fresh count of 1; otherwise the
/// count increments. Reset and increment happen in one UPSERT so concurrent
/// gateways cannot double-count or lose a reset.
pub async fn hit(
    db: &Database,
    key: &str,
    limit: u32,
    window: Duration,
) -> Result<bool, CaselineError> {
    let key = key.to_string();
    let now = now_iso();
    let cutoff = iso_before(window);
    let count: i64 = db
        .connection()
        .call(move |conn| {
            let count = conn.query_row(
                "INSERT INTO rate_limits (key, window_started_at, count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(key) DO UPDATE SET
                     count = CASE WHEN window_started_at <= ?3
                         THEN 1 ELSE count + 1 END,
                     window_started_at = CASE WHEN window_started_at <= ?3
                         THEN ?2 ELSE window_started_at END
                 RETURNING count",
                params![key, now, cutoff],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(count <= i64::from(limit))
}

/// Delete counters whose window closed before `window` ago. Returns the
/// number removed.
pub async fn purge_stale(db: &Database, window: Duration) -> Result<usize, CaselineError> {
    let cutoff = iso_before(window);
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM rate_limits WHERE window_started_at <= ?1",
                params![cutoff],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_blocks() {
        let (db, _dir) = setup_db().await;
        let window = Duration::from_secs(60);

        assert!(hit(&db, "10.0.0.1", 2, window).await.unwrap());
        assert!(hit(&db, "10.0.0.1", 2, window).await.unwrap());
        assert!(!hit(&db, "10.0.0.1", 2, window).await.unwrap());

        // Another key has its own window.
        assert!(hit(&db, "10.0.0.2", 2, window).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn window_resets_after_elapsing() {
        let (db, _dir) = setup_db().await;
        let window = Duration::from_millis(30);

        assert!(hit(&db, "10.0.0.1", 1, window).await.unwrap());
        assert!(!hit(&db, "10.0.0.1", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(hit(&db, "10.0.0.1", 1, window).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn purge_removes_closed_windows_only() {
        let (db, _dir) = setup_db().await;

        hit(&db, "old", 10, Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        hit(&db, "fresh", 10, Duration::from_secs(60)).await.unwrap();

        assert_eq!(purge_stale(&db, Duration::from_millis(10)).await.unwrap(), 1);
        // The fresh key keeps its count.
        assert!(hit(&db, "fresh", 2, Duration::from_secs(60)).await.unwrap());
        assert!(!hit(&db, "fresh", 2, Duration::from_secs(60)).await.unwrap());
        db.close().await.unwrap();
    }
}
