use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::models::{AttachmentRef, ConversationRecord};

/// Document store for transport quote conversations.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }

            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

            let db = Database {
                conn: Arc::new(Mutex::new(conn)),
            };
            db.run_migrations()?;
            Ok(db)
        })
        .await?
    }

    /// Create an in-memory database (used for testing)
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE transport_quote (
                    id TEXT PRIMARY KEY,
                    user_key TEXT NOT NULL UNIQUE,
                    contact_email TEXT NOT NULL,
                    thread_id TEXT NOT NULL,
                    chat_transcript TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE transport_quote_attachments (
                    conversation_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    filename TEXT NOT NULL,
                    file_id TEXT NOT NULL,
                    PRIMARY KEY (conversation_id, position),
                    FOREIGN KEY (conversation_id) REFERENCES transport_quote(id) ON DELETE CASCADE
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    // --- Conversation records ---

    /// Insert a new record. Returns `false` when another record already owns
    /// the same user key.
    pub async fn insert_conversation(&self, record: &ConversationRecord) -> Result<bool> {
        let conn = self.conn.clone();
        let rec = record.clone();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let inserted = conn.execute(
                "INSERT INTO transport_quote (id, user_key, contact_email, thread_id, chat_transcript, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_key) DO NOTHING",
                params![
                    rec.id,
                    rec.user_key,
                    rec.contact_email,
                    rec.thread_id,
                    rec.chat_transcript,
                    rec.created_at.to_rfc3339(),
                    rec.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(inserted == 1)
        })
        .await?
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            Self::load_conversation(&conn, "id", &id)
        })
        .await?
    }

    pub async fn find_by_user_key(&self, user_key: &str) -> Result<Option<ConversationRecord>> {
        let conn = self.conn.clone();
        let user_key = user_key.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            Self::load_conversation(&conn, "user_key", &user_key)
        })
        .await?
    }

    /// Append a transcript entry in one statement, newline-separated from any
    /// prior content.
    pub async fn append_transcript(&self, id: &str, entry: &str) -> Result<()> {
        let conn = self.conn.clone();
        let id = id.to_string();
        let entry = entry.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let updated = conn.execute(
                "UPDATE transport_quote
                 SET chat_transcript = CASE
                         WHEN chat_transcript = '' THEN ?1
                         ELSE chat_transcript || char(10) || ?1
                     END,
                     updated_at = ?2
                 WHERE id = ?3",
                params![entry, Utc::now().to_rfc3339(), id],
            )?;
            if updated == 0 {
                anyhow::bail!("Conversation not found: {}", id);
            }
            Ok(())
        })
        .await?
    }

    pub async fn get_transcript(&self, id: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let id = id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let transcript = conn
                .query_row(
                    "SELECT chat_transcript FROM transport_quote WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(transcript)
        })
        .await?
    }

    // --- Attachment references ---

    pub async fn push_attachment(&self, conversation_id: &str, attachment: &AttachmentRef) -> Result<()> {
        let conn = self.conn.clone();
        let conversation_id = conversation_id.to_string();
        let att = attachment.clone();
        task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;
            let next: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM transport_quote_attachments WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO transport_quote_attachments (conversation_id, position, filename, file_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, next, att.filename, att.file_id],
            )
            .with_context(|| format!("Failed to record attachment for {}", conversation_id))?;
            tx.execute(
                "UPDATE transport_quote SET updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), conversation_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    pub async fn list_attachments(&self, conversation_id: &str) -> Result<Vec<AttachmentRef>> {
        let conn = self.conn.clone();
        let conversation_id = conversation_id.to_string();
        task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            Self::load_attachments(&conn, &conversation_id)
        })
        .await?
    }

    // --- Row helpers ---

    fn load_conversation(
        conn: &Connection,
        column: &'static str,
        value: &str,
    ) -> Result<Option<ConversationRecord>> {
        let sql = format!(
            "SELECT id, user_key, contact_email, thread_id, chat_transcript, created_at, updated_at
             FROM transport_quote WHERE {} = ?1",
            column
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt
            .query_row(params![value], |row| Ok(Self::row_to_conversation(row)))
            .optional()?;
        match result {
            Some(Ok(mut record)) => {
                record.attachments = Self::load_attachments(conn, &record.id)?;
                Ok(Some(record))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn load_attachments(conn: &Connection, conversation_id: &str) -> Result<Vec<AttachmentRef>> {
        let mut stmt = conn.prepare(
            "SELECT filename, file_id FROM transport_quote_attachments
             WHERE conversation_id = ?1 ORDER BY position ASC",
        )?;
        let attachments = stmt
            .query_map(params![conversation_id], |row| {
                Ok(AttachmentRef {
                    filename: row.get(0)?,
                    file_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attachments)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> Result<ConversationRecord> {
        let created_str: String = row.get(5)?;
        let updated_str: String = row.get(6)?;

        Ok(ConversationRecord {
            id: row.get(0)?,
            user_key: row.get(1)?,
            contact_email: row.get(2)?,
            thread_id: row.get(3)?,
            chat_transcript: row.get(4)?,
            attachments: Vec::new(),
            created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_str)?.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_key: &str) -> ConversationRecord {
        let now = Utc::now();
        ConversationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_key: user_key.to_string(),
            contact_email: "a@b.com".to_string(),
            thread_id: "thread_1".to_string(),
            chat_transcript: String::new(),
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_conversation_crud() {
        let db = Database::new_in_memory().unwrap();
        let rec = record("member-1");

        assert!(db.insert_conversation(&rec).await.unwrap());

        let fetched = db.get_conversation(&rec.id).await.unwrap().unwrap();
        assert_eq!(fetched.user_key, "member-1");
        assert_eq!(fetched.thread_id, "thread_1");

        let by_key = db.find_by_user_key("member-1").await.unwrap().unwrap();
        assert_eq!(by_key.id, rec.id);

        assert!(db.find_by_user_key("member-2").await.unwrap().is_none());
        assert!(db.get_conversation("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_key_is_unique() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.insert_conversation(&record("member-1")).await.unwrap());
        assert!(!db.insert_conversation(&record("member-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_append_transcript() {
        let db = Database::new_in_memory().unwrap();
        let rec = record("member-1");
        db.insert_conversation(&rec).await.unwrap();

        db.append_transcript(&rec.id, "first").await.unwrap();
        db.append_transcript(&rec.id, "second").await.unwrap();

        let transcript = db.get_transcript(&rec.id).await.unwrap().unwrap();
        assert_eq!(transcript, "first\nsecond");

        assert!(db.append_transcript("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_attachments_keep_order() {
        let db = Database::new_in_memory().unwrap();
        let rec = record("member-1");
        let other = record("member-2");
        db.insert_conversation(&rec).await.unwrap();
        db.insert_conversation(&other).await.unwrap();

        for (name, id) in [("a.png", "file_a"), ("b.pdf", "file_b")] {
            db.push_attachment(
                &rec.id,
                &AttachmentRef {
                    filename: name.to_string(),
                    file_id: id.to_string(),
                },
            )
            .await
            .unwrap();
        }

        let atts = db.list_attachments(&rec.id).await.unwrap();
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[0].file_id, "file_a");
        assert_eq!(atts[1].file_id, "file_b");

        let fetched = db.get_conversation(&rec.id).await.unwrap().unwrap();
        assert_eq!(fetched.attachments, atts);

        assert!(db.list_attachments(&other.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_for_unknown_conversation_fails() {
        let db = Database::new_in_memory().unwrap();
        let att = AttachmentRef {
            filename: "a.png".to_string(),
            file_id: "file_a".to_string(),
        };
        assert!(db.push_attachment("missing", &att).await.is_err());
    }

    #[tokio::test]
    async fn test_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quotes.db");
        let rec = record("member-1");

        {
            let db = Database::open(&path).await.unwrap();
            db.insert_conversation(&rec).await.unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        assert!(db.get_conversation(&rec.id).await.unwrap().is_some());
    }
}
