use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::models::{Conversation, ConversationWithMessages, Message, Role};

const CONVERSATION_COLUMNS: &str = "id, title, summary, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, role, original_text, translated_text, source_lang, target_lang, audio_blob, audio_duration, created_at";

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create data directory: {}", parent.display())
                    })?;
                }
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
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// `$XDG_DATA_HOME/medbridge/medbridge.db`, falling back to `~/.local/share`.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME")
                    .context("Neither XDG_DATA_HOME nor HOME is set; pass --database-path")?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir.join("medbridge").join("medbridge.db"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

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
                "CREATE TABLE conversations (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    summary TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    original_text TEXT NOT NULL DEFAULT '',
                    translated_text TEXT NOT NULL DEFAULT '',
                    source_lang TEXT NOT NULL DEFAULT 'en',
                    target_lang TEXT NOT NULL DEFAULT 'en',
                    audio_blob TEXT,
                    audio_duration INTEGER,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE INDEX idx_conversations_updated ON conversations(updated_at DESC);
                CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            f(&conn)
        })
        .await?
    }

    // --- Conversation CRUD ---

    pub async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conv = conversation.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, title, summary, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    conv.id,
                    conv.title,
                    conv.summary,
                    timestamp(&conv.created_at),
                    timestamp(&conv.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let id = id.to_string();
        self.with_conn(move |conn| query_conversation(conn, &id)).await
    }

    /// Conversations by most recent activity, each with only its latest message.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationWithMessages>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY updated_at DESC, rowid DESC"
            ))?;
            let conversations = stmt
                .query_map([], |row| Ok(row_to_conversation(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;

            let mut latest = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ))?;

            let mut result = Vec::with_capacity(conversations.len());
            for conversation in conversations {
                let message = latest
                    .query_row(params![conversation.id], |row| Ok(row_to_message(row)))
                    .optional()?
                    .transpose()?;
                result.push(ConversationWithMessages {
                    conversation,
                    messages: message.into_iter().collect(),
                });
            }
            Ok(result)
        })
        .await
    }

    /// Overwrite whichever of `title` / `summary` is given and bump `updated_at`.
    /// `summary` is tri-state: `None` keeps it, `Some(None)` clears it.
    /// Returns `None` when the conversation does not exist.
    pub async fn update_conversation(
        &self,
        id: &str,
        title: Option<String>,
        summary: Option<Option<String>>,
    ) -> Result<Option<Conversation>> {
        let id = id.to_string();
        let set_summary = summary.is_some();
        let summary = summary.flatten();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations
                 SET title = COALESCE(?1, title),
                     summary = CASE WHEN ?2 THEN ?3 ELSE summary END,
                     updated_at = ?4
                 WHERE id = ?5",
                params![title, set_summary, summary, timestamp(&Utc::now()), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_conversation(conn, &id)
        })
        .await
    }

    /// All conversations in creation order, each with every message oldest first.
    pub async fn load_corpus(&self) -> Result<Vec<ConversationWithMessages>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY created_at ASC, rowid ASC"
            ))?;
            let conversations = stmt
                .query_map([], |row| Ok(row_to_conversation(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY created_at ASC, rowid ASC"
            ))?;
            let messages = stmt
                .query_map([], |row| Ok(row_to_message(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;

            let mut by_conversation: HashMap<String, Vec<Message>> = HashMap::new();
            for msg in messages {
                by_conversation
                    .entry(msg.conversation_id.clone())
                    .or_default()
                    .push(msg);
            }

            Ok(conversations
                .into_iter()
                .map(|conversation| {
                    let messages = by_conversation
                        .remove(&conversation.id)
                        .unwrap_or_default();
                    ConversationWithMessages {
                        conversation,
                        messages,
                    }
                })
                .collect())
        })
        .await
    }

    // --- Message CRUD ---

    /// Insert the message and bump the parent conversation's `updated_at`,
    /// which never moves backwards.
    pub async fn insert_message(&self, message: &Message) -> Result<()> {
        let msg = message.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.role.as_str(),
                    msg.original_text,
                    msg.translated_text,
                    msg.source_lang,
                    msg.target_lang,
                    msg.audio_blob,
                    msg.audio_duration,
                    timestamp(&msg.created_at),
                ],
            )?;
            conn.execute(
                "UPDATE conversations SET updated_at = MAX(updated_at, ?1) WHERE id = ?2",
                params![timestamp(&msg.created_at), msg.conversation_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let messages = stmt
                .query_map(params![conversation_id], |row| Ok(row_to_message(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await
    }

    pub async fn get_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>> {
        let conversation_id = conversation_id.to_string();
        let message_id = message_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 AND id = ?2"
                ),
                params![conversation_id, message_id],
                |row| Ok(row_to_message(row)),
            )
            .optional()?
            .transpose()
        })
        .await
    }
}

// --- Row helpers ---

/// Fixed-width RFC 3339 so text ordering matches chronological ordering.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp in database: {}", s))?
        .with_timezone(&Utc))
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        |row| Ok(row_to_conversation(row)),
    )
    .optional()?
    .transpose()
}

fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation> {
    let created_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        created_at: parse_timestamp(&created_str)?,
        updated_at: parse_timestamp(&updated_str)?,
    })
}

fn row_to_message(row: &rusqlite::Row) -> Result<Message> {
    let role_str: String = row.get(2)?;
    let created_str: String = row.get(9)?;

    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: Role::from_str(&role_str)
            .ok_or_else(|| anyhow!("Unknown role: {}", role_str))?,
        original_text: row.get(3)?,
        translated_text: row.get(4)?,
        source_lang: row.get(5)?,
        target_lang: row.get(6)?,
        audio_blob: row.get(7)?,
        audio_duration: row.get(8)?,
        created_at: parse_timestamp(&created_str)?,
    })
}
