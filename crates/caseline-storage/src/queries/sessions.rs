// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations with TTL semantics.
//!
//! Reads filter expired rows; every update refreshes `updated_at` and
//! pushes `expires_at` forward. Updates run read-apply-write inside one
//! `conn.call` so callers never hold a split read-modify-write.

use std::str::FromStr;

use caseline_core::types::now_iso;
use caseline_core::{CaselineError, LeadStatus, Session, SessionUpdate, Stage};
use rusqlite::params;

use crate::database::Database;

const SESSION_COLUMNS: &str = "id, stage, main_category, sub_category, answers, asked_fields,
     ip, user_agent, trusted_form_cert_url, lead_status, created_at, updated_at, expires_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    let stage_text: String = row.get(1)?;
    let answers_json: String = row.get(4)?;
    let asked_json: String = row.get(5)?;
    let lead_status_text: Option<String> = row.get(9)?;

    let stage = Stage::from_str(&stage_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let answers = serde_json::from_str(&answers_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let asked_fields = serde_json::from_str(&asked_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let lead_status = lead_status_text
        .map(|s| {
            LeadStatus::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;

    Ok(Session {
        id: row.get(0)?,
        stage,
        main_category: row.get(2)?,
        sub_category: row.get(3)?,
        answers,
        asked_fields,
        ip: row.get(6)?,
        user_agent: row.get(7)?,
        trusted_form_cert_url: row.get(8)?,
        lead_status,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        expires_at: row.get(12)?,
    })
}

fn expires_from(now: &str, ttl_days: u32) -> String {
    // The ISO format is lexicographically ordered, so the arithmetic can
    // go through chrono and come back out as text.
    let parsed = chrono::DateTime::parse_from_rfc3339(now)
        .map(|t| t.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());
    (parsed + chrono::Duration::days(i64::from(ttl_days)))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Create a session. A caller-supplied id is used verbatim; otherwise a
/// uuid v4 is minted.
pub async fn create_session(
    db: &Database,
    id: Option<String>,
    ip: &str,
    user_agent: &str,
    trusted_form_cert_url: Option<String>,
    ttl_days: u32,
) -> Result<Session, CaselineError> {
    let now = now_iso();
    let session = Session {
        id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        stage: Stage::Init,
        main_category: None,
        sub_category: None,
        answers: Default::default(),
        asked_fields: Vec::new(),
        ip: ip.to_string(),
        user_agent: user_agent.to_string(),
        trusted_form_cert_url,
        lead_status: None,
        created_at: now.clone(),
        updated_at: now.clone(),
        expires_at: expires_from(&now, ttl_days),
    };

    let inserted = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, stage, main_category, sub_category, answers,
                     asked_fields, ip, user_agent, trusted_form_cert_url, lead_status,
                     created_at, updated_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    inserted.id,
                    inserted.stage.to_string(),
                    inserted.main_category,
                    inserted.sub_category,
                    serde_json::to_string(&inserted.answers).unwrap_or_else(|_| "{}".into()),
                    serde_json::to_string(&inserted.asked_fields).unwrap_or_else(|_| "[]".into()),
                    inserted.ip,
                    inserted.user_agent,
                    inserted.trusted_form_cert_url,
                    inserted.lead_status.map(|s| s.to_string()),
                    inserted.created_at,
                    inserted.updated_at,
                    inserted.expires_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    Ok(session)
}

/// Get an unexpired session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, CaselineError> {
    let id = id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND expires_at > ?2"
            ))?;
            let result = stmt.query_row(params![id, now], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Merge a partial update into a session, refreshing `updated_at` and the
/// TTL. Enforces forward-only stage transitions and the never-erase merge
/// rule for answers.
pub async fn update_session(
    db: &Database,
    id: &str,
    update: SessionUpdate,
    ttl_days: u32,
) -> Result<Option<Session>, CaselineError> {
    let id = id.to_string();
    let now = now_iso();
    let expires = expires_from(&now, ttl_days);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let found = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND expires_at > ?2"
                ))?;
                match stmt.query_row(params![id, now], row_to_session) {
                    Ok(session) => Some(session),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };
            let Some(mut session) = found else {
                tx.commit()?;
                return Ok(None);
            };

            if let Some(stage) = update.stage {
                if !session.stage.can_advance_to(stage) {
                    return Err(tokio_rusqlite::Error::Other(Box::new(
                        CaselineError::Internal(format!(
                            "illegal stage transition {} -> {stage} for session {}",
                            session.stage, session.id
                        )),
                    )));
                }
                session.stage = stage;
            }
            // Category is frozen once set; a second write is ignored.
            if session.main_category.is_none() {
                session.main_category = update.main_category;
            }
            if session.sub_category.is_none() {
                session.sub_category = update.sub_category;
            }
            if let Some(new_answers) = update.answers {
                for (key, value) in new_answers {
                    let existing_non_empty = session
                        .answers
                        .get(&key)
                        .is_some_and(|v| !v.is_empty());
                    if value.is_empty() && existing_non_empty {
                        continue;
                    }
                    session.answers.insert(key, value);
                }
            }
            if let Some(asked) = update.asked_fields {
                for field in asked {
                    if !session.asked_fields.contains(&field) {
                        session.asked_fields.push(field);
                    }
                }
            }
            if let Some(status) = update.lead_status {
                session.lead_status = Some(status);
            }
            session.updated_at = now.clone();
            session.expires_at = expires.clone();

            tx.execute(
                "UPDATE sessions SET stage = ?1, main_category = ?2, sub_category = ?3,
                     answers = ?4, asked_fields = ?5, lead_status = ?6,
                     updated_at = ?7, expires_at = ?8
                 WHERE id = ?9",
                params![
                    session.stage.to_string(),
                    session.main_category,
                    session.sub_category,
                    serde_json::to_string(&session.answers).unwrap_or_else(|_| "{}".into()),
                    serde_json::to_string(&session.asked_fields).unwrap_or_else(|_| "[]".into()),
                    session.lead_status.map(|s| s.to_string()),
                    session.updated_at,
                    session.expires_at,
                    session.id,
                ],
            )?;
            tx.commit()?;
            Ok(Some(session))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The explicit reset operation: back to `init` with a clean slate.
pub async fn reset_session(
    db: &Database,
    id: &str,
    ttl_days: u32,
) -> Result<Option<Session>, CaselineError> {
    let id_owned = id.to_string();
    let now = now_iso();
    let expires = expires_from(&now, ttl_days);

    let changed = db
        .connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE sessions SET stage = 'init', main_category = NULL,
                     sub_category = NULL, answers = '{}', asked_fields = '[]',
                     lead_status = NULL, updated_at = ?1, expires_at = ?2
                 WHERE id = ?3",
                params![now, expires, id_owned],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Ok(None);
    }
    get_session(db, id).await
}

/// Delete sessions past their TTL. Transcript rows cascade.
pub async fn purge_expired(db: &Database) -> Result<usize, CaselineError> {
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseline_core::AnswerMap;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_mints_uuid_when_no_id_supplied() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "10.0.0.1", "test-agent", None, 7)
            .await
            .unwrap();
        assert!(!session.id.is_empty());
        assert_eq!(session.stage, Stage::Init);

        let fetched = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(fetched.ip, "10.0.0.1");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_honors_caller_supplied_id() {
        let (db, _dir) = setup_db().await;
        let session = create_session(
            &db,
            Some("widget-cookie-123".to_string()),
            "10.0.0.1",
            "ua",
            Some("https://cert.example/abc".to_string()),
            7,
        )
        .await
        .unwrap();
        assert_eq!(session.id, "widget-cookie-123");
        assert_eq!(
            session.trusted_form_cert_url.as_deref(),
            Some("https://cert.example/abc")
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_merges_answers_and_advances_stage() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        let mut answers = AnswerMap::new();
        answers.insert("first_name".into(), "Jane".into());
        let updated = update_session(
            &db,
            &session.id,
            SessionUpdate {
                stage: Some(Stage::Categorized),
                main_category: Some("personal_injury".into()),
                sub_category: Some("car accident".into()),
                answers: Some(answers),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.stage, Stage::Categorized);
        assert_eq!(updated.main_category.as_deref(), Some("personal_injury"));
        assert_eq!(updated.answers.get("first_name").unwrap(), "Jane");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn merge_never_erases_non_empty_value() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        let mut answers = AnswerMap::new();
        answers.insert("phone".into(), "(555) 123-4567".into());
        update_session(
            &db,
            &session.id,
            SessionUpdate {
                answers: Some(answers),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap();

        // An empty extraction for the same field must not erase it.
        let mut empty = AnswerMap::new();
        empty.insert("phone".into(), "".into());
        let updated = update_session(
            &db,
            &session.id,
            SessionUpdate {
                answers: Some(empty),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.answers.get("phone").unwrap(), "(555) 123-4567");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn category_is_frozen_after_first_write() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        update_session(
            &db,
            &session.id,
            SessionUpdate {
                main_category: Some("personal_injury".into()),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap();

        let updated = update_session(
            &db,
            &session.id,
            SessionUpdate {
                main_category: Some("family_law".into()),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.main_category.as_deref(), Some("personal_injury"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn backward_stage_transition_is_rejected() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        update_session(
            &db,
            &session.id,
            SessionUpdate {
                stage: Some(Stage::Collecting),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap();

        let result = update_session(
            &db,
            &session.id,
            SessionUpdate {
                stage: Some(Stage::Categorized),
                ..Default::default()
            },
            7,
        )
        .await;
        assert!(result.is_err(), "collecting -> categorized must be rejected");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reset_returns_session_to_init() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        let mut answers = AnswerMap::new();
        answers.insert("first_name".into(), "Jane".into());
        update_session(
            &db,
            &session.id,
            SessionUpdate {
                stage: Some(Stage::Collecting),
                main_category: Some("family_law".into()),
                answers: Some(answers),
                ..Default::default()
            },
            7,
        )
        .await
        .unwrap();

        let reset = reset_session(&db, &session.id, 7).await.unwrap().unwrap();
        assert_eq!(reset.stage, Stage::Init);
        assert!(reset.main_category.is_none());
        assert!(reset.answers.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent_and_purges() {
        let (db, _dir) = setup_db().await;
        let session = create_session(&db, None, "ip", "ua", None, 7).await.unwrap();

        // Force expiry in the past.
        let id = session.id.clone();
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET expires_at = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(get_session(&db, &session.id).await.unwrap().is_none());
        assert_eq!(purge_expired(&db).await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_missing_session_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = update_session(&db, "no-such", SessionUpdate::default(), 7)
            .await
            .unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }
}
