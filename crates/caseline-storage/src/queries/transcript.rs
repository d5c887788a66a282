// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation transcript operations.

use caseline_core::{CaselineError, TranscriptEntry};
use rusqlite::params;

use crate::database::Database;

/// Append one transcript entry.
pub async fn append_entry(db: &Database, entry: &TranscriptEntry) -> Result<(), CaselineError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO transcript (id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    entry.session_id,
                    entry.role,
                    entry.content,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session's transcript in chronological order.
pub async fn get_for_session(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<TranscriptEntry>, CaselineError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut entries = Vec::new();
            let map_row = |row: &rusqlite::Row<'_>| {
                Ok(TranscriptEntry {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            };
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, content, created_at
                         FROM transcript WHERE session_id = ?1
                         ORDER BY created_at ASC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![session_id, lim], map_row)?;
                    for row in rows {
                        entries.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, content, created_at
                         FROM transcript WHERE session_id = ?1
                         ORDER BY created_at ASC",
                    )?;
                    let rows = stmt.query_map(params![session_id], map_row)?;
                    for row in rows {
                        entries.push(row?);
                    }
                }
            }
            Ok(entries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::sessions::create_session;
    use caseline_core::types::now_iso;
    use tempfile::tempdir;

    async fn setup_db_with_session() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();
        (db, session.id, dir)
    }

    fn entry(id: &str, session_id: &str, role: &str, content: &str) -> TranscriptEntry {
        TranscriptEntry {
            id: id.to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn append_and_read_in_order() {
        let (db, session_id, _dir) = setup_db_with_session().await;

        append_entry(&db, &entry("t1", &session_id, "user", "I was in a car accident"))
            .await
            .unwrap();
        append_entry(&db, &entry("t2", &session_id, "assistant", "Could I get your first name?"))
            .await
            .unwrap();
        append_entry(&db, &entry("t3", &session_id, "system", "lead delivered"))
            .await
            .unwrap();

        let all = get_for_session(&db, &session_id, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].role, "user");
        assert_eq!(all[2].role, "system");

        let limited = get_for_session(&db, &session_id, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_session_has_empty_transcript() {
        let (db, _session_id, _dir) = setup_db_with_session().await;
        let none = get_for_session(&db, "no-such", None).await.unwrap();
        assert!(none.is_empty());
        db.close().await.unwrap();
    }
}
