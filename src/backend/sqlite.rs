//! SQLite implementation of the chat backend
//!
//! # Architecture
//!
//! ```text
//! ChatService task
//!         │
//!         └──→ SqliteBackend (r2d2 pool, spawn_blocking)
//!                 │
//!                 ├──→ users / policies        (read)
//!                 ├──→ conversations / messages (read + write)
//!                 └──→ reply task ──→ Assistant ──→ ReplyEvent channel
//! ```
//!
//! The database runs in WAL mode so the TUI can read while a reply task
//! stores messages. Schema changes go through `metadata.schema_version`.

use super::{ChatBackend, ReplyEvent, ReplyStream};
use crate::assistant::{estimate_tokens, Assistant, AssistantChunk, AssistantRequest};
use crate::model::{
    new_id, title_from_message, Client, Conversation, DeliveryStatus, Message, MessageKind,
    Operator, Policy, PolicyStatus, Role,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use futures::StreamExt;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Connections for a file database
const POOL_SIZE: u32 = 4;

/// Buffered reply events between the reply task and the service
const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    assistant: Arc<dyn Assistant>,
    /// Earlier messages handed to the assistant with each prompt
    max_history: usize,
}

impl SqliteBackend {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(
        db_path: impl AsRef<Path>,
        assistant: Arc<dyn Assistant>,
        max_history: usize,
    ) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout=5000;"));
        let pool = Pool::builder()
            .max_size(POOL_SIZE)
            .build(manager)
            .with_context(|| format!("opening database {}", db_path.display()))?;

        Self::from_pool(pool, assistant, max_history)
    }

    /// Private in-memory database (demo mode and tests)
    ///
    /// A single connection that is never recycled: an in-memory database
    /// lives exactly as long as its connection.
    pub fn in_memory(assistant: Arc<dyn Assistant>, max_history: usize) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())
            .context("opening in-memory database")?;

        Self::from_pool(pool, assistant, max_history)
    }

    fn from_pool(
        pool: Pool<SqliteConnectionManager>,
        assistant: Arc<dyn Assistant>,
        max_history: usize,
    ) -> Result<Self> {
        {
            let conn = pool.get()?;
            init_schema(&conn)?;
        }
        Ok(Self {
            pool,
            assistant,
            max_history,
        })
    }

    pub fn assistant_name(&self) -> &'static str {
        self.assistant.name()
    }

    /// Run database work on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().context("no database connection available")?;
            f(&conn)
        })
        .await
        .context("database task failed")?
    }

    /// Insert the demo clients, policies and conversations
    ///
    /// Returns `None` when the database already has users.
    pub async fn seed_demo(&self) -> Result<Option<super::SeedSummary>> {
        self.blocking(super::seed_demo).await
    }

    /// Drive one reply: forward deltas, store the AI message, report the end
    async fn stream_reply(
        self,
        user_message: Message,
        undo: PromptUndo,
        request: AssistantRequest,
        tx: mpsc::Sender<ReplyEvent>,
    ) {
        let conversation_id = user_message.conversation_id.clone();
        // A closed receiver only means nobody is watching; the reply is still stored
        let _ = tx.send(ReplyEvent::Accepted(user_message)).await;

        let last = match self.collect_reply(&conversation_id, request, &tx).await {
            Ok(message) => {
                tracing::debug!(
                    conversation = %conversation_id,
                    tokens = ?message.tokens,
                    "Reply stored"
                );
                ReplyEvent::Completed(message)
            }
            Err(e) => {
                tracing::warn!(conversation = %conversation_id, "Reply failed: {:#}", e);
                // The failed prompt stays on screen for retry, not in history
                if let Err(e) = self
                    .blocking(move |conn| discard_prompt(conn, &undo))
                    .await
                {
                    tracing::error!("Failed to drop unanswered message: {:#}", e);
                }
                ReplyEvent::Failed(format!("{:#}", e))
            }
        };
        let _ = tx.send(last).await;
    }

    async fn collect_reply(
        &self,
        conversation_id: &str,
        request: AssistantRequest,
        tx: &mpsc::Sender<ReplyEvent>,
    ) -> Result<Message> {
        let mut chunks = self
            .assistant
            .reply(request)
            .await
            .with_context(|| format!("{} assistant", self.assistant.name()))?;

        let mut content = String::new();
        let mut usage = None;
        while let Some(chunk) = chunks.next().await {
            match chunk? {
                AssistantChunk::Delta(text) => {
                    content.push_str(&text);
                    let _ = tx.send(ReplyEvent::Delta(text)).await;
                }
                AssistantChunk::Usage(tokens) => usage = Some(tokens),
            }
        }

        if content.trim().is_empty() {
            bail!("assistant returned an empty reply");
        }

        let message = Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            kind: MessageKind::Ai,
            tokens: Some(usage.unwrap_or_else(|| estimate_tokens(&content))),
            content,
            created_at: Utc::now(),
            status: DeliveryStatus::Sent,
        };
        let stored = message.clone();
        self.blocking(move |conn| append_message(conn, &stored))
            .await?;
        Ok(message)
    }
}

#[async_trait]
impl ChatBackend for SqliteBackend {
    async fn list_clients(&self, operator: &Operator) -> Result<Vec<Client>> {
        let operator = operator.clone();
        self.blocking(move |conn| query_clients(conn, &operator))
            .await
    }

    async fn list_conversations(&self, client_id: &str) -> Result<Vec<Conversation>> {
        let client_id = client_id.to_string();
        self.blocking(move |conn| query_conversations(conn, &client_id))
            .await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let conversation_id = conversation_id.to_string();
        self.blocking(move |conn| query_messages(conn, &conversation_id))
            .await
    }

    async fn create_conversation(
        &self,
        client_id: &str,
        title: Option<String>,
    ) -> Result<Conversation> {
        let client_id = client_id.to_string();
        let conversation = self
            .blocking(move |conn| {
                if find_client(conn, &client_id)?.is_none() {
                    bail!("unknown client {}", client_id);
                }
                let now = Utc::now();
                let conversation = Conversation {
                    id: new_id(),
                    client_id,
                    title: title
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty()),
                    updated_at: now,
                };
                conn.execute(
                    "INSERT INTO conversations (id, client_id, title, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![
                        conversation.id,
                        conversation.client_id,
                        conversation.title,
                        timestamp(now)
                    ],
                )?;
                Ok(conversation)
            })
            .await?;

        tracing::info!(
            conversation = %conversation.id,
            client = %conversation.client_id,
            "Conversation created"
        );
        Ok(conversation)
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<ReplyStream> {
        let text = text.trim().to_string();
        if text.is_empty() {
            bail!("cannot send an empty message");
        }

        let conversation_id = conversation_id.to_string();
        let max_history = self.max_history;
        let (user_message, undo, request) = self
            .blocking(move |conn| {
                let conversation = find_conversation(conn, &conversation_id)?
                    .ok_or_else(|| anyhow!("conversation {} not found", conversation_id))?;
                let client = find_client(conn, &conversation.client_id)?
                    .ok_or_else(|| anyhow!("unknown client {}", conversation.client_id))?;
                let policies = query_policies(conn, &client.id)?;

                let mut history = query_messages(conn, &conversation.id)?;
                let skip = history.len().saturating_sub(max_history);
                history.drain(..skip);

                let message = Message {
                    id: new_id(),
                    conversation_id: conversation.id.clone(),
                    kind: MessageKind::User,
                    content: text.clone(),
                    created_at: Utc::now(),
                    tokens: None,
                    status: DeliveryStatus::Sent,
                };
                let undo = PromptUndo {
                    message_id: message.id.clone(),
                    conversation_id: conversation.id,
                    title: conversation.title,
                    updated_at: conversation.updated_at,
                };
                append_message(conn, &message)?;

                let request = AssistantRequest {
                    client,
                    policies,
                    history,
                    prompt: text,
                };
                Ok((message, undo, request))
            })
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let backend = self.clone();
        tokio::spawn(backend.stream_reply(user_message, undo, request, tx));

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn list_policies(&self, client_id: &str) -> Result<Vec<Policy>> {
        let client_id = client_id.to_string();
        self.blocking(move |conn| query_policies(conn, &client_id))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// Initialize database schema with WAL mode and run migrations
pub(super) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA busy_timeout=5000;
        "#,
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(
                (SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'),
                0
            )",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }
    if current_version > SCHEMA_VERSION {
        tracing::warn!(
            found = current_version,
            supported = SCHEMA_VERSION,
            "Database schema is newer than this build"
        );
    }
    Ok(())
}

/// Initial schema (v1)
fn apply_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        -- Back-office accounts; only role USER rows are selectable clients
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'USER',
            office_id TEXT,
            advisor_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_users_office ON users(office_id);
        CREATE INDEX IF NOT EXISTS idx_users_advisor ON users(advisor_id);

        CREATE TABLE IF NOT EXISTS policies (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES users(id),
            insurer TEXT NOT NULL,
            number TEXT NOT NULL,
            category TEXT NOT NULL,
            status TEXT NOT NULL,
            coverage TEXT NOT NULL DEFAULT '',
            premium_cents INTEGER NOT NULL DEFAULT 0,
            ends_on TEXT  -- YYYY-MM-DD
        );
        CREATE INDEX IF NOT EXISTS idx_policies_client ON policies(client_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES users(id),
            title TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_client
            ON conversations(client_id, updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            kind TEXT NOT NULL CHECK (kind IN ('USER', 'AI')),
            content TEXT NOT NULL,
            tokens INTEGER,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        INSERT INTO metadata (key, value) VALUES ('schema_version', '1');
        "#,
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Timestamps are stored as fixed-width RFC 3339 so they sort as text
pub(super) fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    let role: String = row.get(3)?;
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role).ok_or_else(|| conversion_error(3, format!("unknown role {role}")))?,
        office_id: row.get(4)?,
        advisor_id: row.get(5)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        client_id: row.get(1)?,
        title: row.get(2)?,
        updated_at: timestamp_at(row, 3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(2)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        kind: MessageKind::parse(&kind)
            .ok_or_else(|| conversion_error(2, format!("unknown message kind {kind}")))?,
        content: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
        tokens: row.get(5)?,
        status: DeliveryStatus::Sent,
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<Policy> {
    let status: String = row.get(5)?;
    let ends_on: Option<String> = row.get(8)?;
    Ok(Policy {
        id: row.get(0)?,
        client_id: row.get(1)?,
        insurer: row.get(2)?,
        number: row.get(3)?,
        category: row.get(4)?,
        status: PolicyStatus::parse(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown policy status {status}")))?,
        coverage: row.get(6)?,
        premium_cents: row.get(7)?,
        ends_on: ends_on
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| conversion_error(8, e))?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

/// Clients visible to an operator
///
/// ADMIN sees every client, OFFICE_ADMIN the clients of their office, an
/// ADVISOR only the clients assigned to them.
fn query_clients(conn: &Connection, operator: &Operator) -> Result<Vec<Client>> {
    let (filter, arg) = match operator.role {
        Role::Admin => ("", None),
        Role::OfficeAdmin => match operator.office_id.as_deref() {
            Some(office) => ("AND office_id = ?1", Some(office)),
            None => {
                tracing::warn!(operator = %operator.id, "Office admin without office sees no clients");
                return Ok(Vec::new());
            }
        },
        Role::Advisor => ("AND advisor_id = ?1", Some(operator.id.as_str())),
        Role::User => return Ok(Vec::new()),
    };

    let sql = format!(
        "SELECT id, name, email, role, office_id, advisor_id
         FROM users
         WHERE role = 'USER' {}
         ORDER BY name COLLATE NOCASE",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let clients = stmt
        .query_map(params_from_iter(arg), client_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(clients)
}

fn find_client(conn: &Connection, client_id: &str) -> Result<Option<Client>> {
    let client = conn
        .query_row(
            "SELECT id, name, email, role, office_id, advisor_id
             FROM users WHERE id = ?1 AND role = 'USER'",
            params![client_id],
            client_from_row,
        )
        .optional()?;
    Ok(client)
}

fn query_conversations(conn: &Connection, client_id: &str) -> Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, title, updated_at
         FROM conversations
         WHERE client_id = ?1
         ORDER BY updated_at DESC, rowid DESC",
    )?;
    let conversations = stmt
        .query_map(params![client_id], conversation_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(conversations)
}

fn find_conversation(conn: &Connection, conversation_id: &str) -> Result<Option<Conversation>> {
    let conversation = conn
        .query_row(
            "SELECT id, client_id, title, updated_at FROM conversations WHERE id = ?1",
            params![conversation_id],
            conversation_from_row,
        )
        .optional()?;
    Ok(conversation)
}

fn query_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, kind, content, created_at, tokens
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at, rowid",
    )?;
    let messages = stmt
        .query_map(params![conversation_id], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

/// Policies of a client, active ones first
fn query_policies(conn: &Connection, client_id: &str) -> Result<Vec<Policy>> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, insurer, number, category, status, coverage, premium_cents, ends_on
         FROM policies
         WHERE client_id = ?1
         ORDER BY CASE status WHEN 'ACTIVE' THEN 0 ELSE 1 END, category",
    )?;
    let policies = stmt
        .query_map(params![client_id], policy_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(policies)
}

// ─────────────────────────────────────────────────────────────────────────────
// Writes
// ─────────────────────────────────────────────────────────────────────────────

pub(super) fn store_client(conn: &Connection, client: &Client) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, office_id, advisor_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            client.id,
            client.name,
            client.email,
            client.role.as_str(),
            client.office_id,
            client.advisor_id
        ],
    )?;
    Ok(())
}

pub(super) fn store_policy(conn: &Connection, policy: &Policy) -> Result<()> {
    conn.execute(
        "INSERT INTO policies
            (id, client_id, insurer, number, category, status, coverage, premium_cents, ends_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            policy.id,
            policy.client_id,
            policy.insurer,
            policy.number,
            policy.category,
            policy.status.as_str(),
            policy.coverage,
            policy.premium_cents,
            policy.ends_on.map(|d| d.format("%Y-%m-%d").to_string())
        ],
    )?;
    Ok(())
}

pub(super) fn store_conversation(
    conn: &Connection,
    conversation: &Conversation,
    created_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, client_id, title, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            conversation.id,
            conversation.client_id,
            conversation.title,
            timestamp(created_at),
            timestamp(conversation.updated_at)
        ],
    )?;
    Ok(())
}

/// Insert a message and bump its conversation
///
/// An untitled conversation takes its title from the first user message.
/// Runs inside the caller's transaction, if any.
pub(super) fn store_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, kind, content, tokens, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.id,
            message.conversation_id,
            message.kind.as_str(),
            message.content,
            message.tokens,
            timestamp(message.created_at)
        ],
    )?;

    let title = if message.is_user() {
        title_from_message(&message.content)
    } else {
        None
    };
    conn.execute(
        "UPDATE conversations
         SET updated_at = MAX(updated_at, ?2), title = COALESCE(title, ?3)
         WHERE id = ?1",
        params![message.conversation_id, timestamp(message.created_at), title],
    )?;
    Ok(())
}

/// [`store_message`] as its own transaction
fn append_message(conn: &Connection, message: &Message) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    store_message(&tx, message)?;
    tx.commit()?;
    Ok(())
}

/// What storing a prompt changed, for taking it back when the reply fails
#[derive(Debug, Clone)]
struct PromptUndo {
    message_id: String,
    conversation_id: String,
    title: Option<String>,
    updated_at: DateTime<Utc>,
}

/// Remove an unanswered prompt and restore its conversation's title and
/// `updated_at`, in one transaction
fn discard_prompt(conn: &Connection, undo: &PromptUndo) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM messages WHERE id = ?1", params![undo.message_id])?;
    // Messages stored since still count towards updated_at
    tx.execute(
        "UPDATE conversations
         SET title = ?2,
             updated_at = MAX(?3, COALESCE(
                 (SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1), ?3))
         WHERE id = ?1",
        params![undo.conversation_id, undo.title, timestamp(undo.updated_at)],
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{ChunkStream, ScriptedAssistant};
    use crate::backend::seed::ids;
    use std::time::Duration;

    fn scripted() -> Arc<dyn Assistant> {
        Arc::new(ScriptedAssistant::new(Duration::ZERO))
    }

    async fn seeded() -> SqliteBackend {
        let backend = SqliteBackend::in_memory(scripted(), 20).unwrap();
        backend.seed_demo().await.unwrap().expect("fresh database");
        backend
    }

    fn operator(id: &str, role: Role, office: Option<&str>) -> Operator {
        Operator {
            id: id.into(),
            role,
            office_id: office.map(String::from),
        }
    }

    async fn collect(stream: ReplyStream) -> Vec<ReplyEvent> {
        stream.collect().await
    }

    struct BrokenAssistant;

    #[async_trait]
    impl Assistant for BrokenAssistant {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn reply(&self, _request: AssistantRequest) -> Result<ChunkStream> {
            bail!("upstream returned 503")
        }
    }

    #[tokio::test]
    async fn test_admin_sees_all_clients_but_no_staff() {
        let backend = seeded().await;
        let clients = backend
            .list_clients(&operator("admin", Role::Admin, None))
            .await
            .unwrap();

        let names: Vec<_> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ana Souza", "Bruno Lima", "Carla Mendes"]);
        assert!(clients.iter().all(|c| c.role == Role::User));
    }

    #[tokio::test]
    async fn test_advisor_sees_only_own_clients() {
        let backend = seeded().await;
        let clients = backend
            .list_clients(&operator(ids::ADVISOR_MARCOS, Role::Advisor, Some(ids::OFFICE_CENTRO)))
            .await
            .unwrap();

        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, ids::ANA);
    }

    #[tokio::test]
    async fn test_office_admin_scoping() {
        let backend = seeded().await;
        let centro = backend
            .list_clients(&operator("oa", Role::OfficeAdmin, Some(ids::OFFICE_CENTRO)))
            .await
            .unwrap();
        assert_eq!(centro.len(), 2);

        let no_office = backend
            .list_clients(&operator("oa", Role::OfficeAdmin, None))
            .await
            .unwrap();
        assert!(no_office.is_empty());
    }

    #[tokio::test]
    async fn test_seeded_history_is_chronological() {
        let backend = seeded().await;
        let conversations = backend.list_conversations(ids::ANA).await.unwrap();
        let auto = conversations
            .iter()
            .find(|c| c.display_title() == "Cobertura auto")
            .expect("seeded conversation");

        let messages = backend.list_messages(&auto.id).await.unwrap();
        let kinds: Vec<_> = messages.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::User, MessageKind::Ai]);
        assert!(messages[1].tokens.is_some());
    }

    #[tokio::test]
    async fn test_new_conversation_is_listed_first() {
        let backend = seeded().await;
        let created = backend
            .create_conversation(ids::BRUNO, Some("  Sinistro  ".into()))
            .await
            .unwrap();
        assert_eq!(created.title.as_deref(), Some("Sinistro"));

        let conversations = backend.list_conversations(ids::BRUNO).await.unwrap();
        assert_eq!(conversations[0].id, created.id);
    }

    #[tokio::test]
    async fn test_create_conversation_for_unknown_client_fails() {
        let backend = seeded().await;
        assert!(backend.create_conversation("nobody", None).await.is_err());
        // Staff accounts are not clients
        assert!(backend
            .create_conversation(ids::ADVISOR_MARCOS, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_send_message_streams_and_stores_reply() {
        let backend = seeded().await;
        let conversation = backend.create_conversation(ids::ANA, None).await.unwrap();

        let stream = backend
            .send_message(&conversation.id, "Quais coberturas tenho?")
            .await
            .unwrap();
        let events = collect(stream).await;

        assert!(matches!(events.first(), Some(ReplyEvent::Accepted(m)) if m.is_user()));
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                ReplyEvent::Delta(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let Some(ReplyEvent::Completed(ai)) = events.last() else {
            panic!("expected Completed, got {:?}", events.last());
        };
        assert_eq!(ai.content, streamed);
        assert!(ai.tokens.unwrap() > 0);

        let stored = backend.list_messages(&conversation.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "Quais coberturas tenho?");
        assert_eq!(stored[1].id, ai.id);

        // Untitled conversation takes the first prompt as its title
        let listed = backend.list_conversations(ids::ANA).await.unwrap();
        assert_eq!(listed[0].id, conversation.id);
        assert_eq!(listed[0].title.as_deref(), Some("Quais coberturas tenho?"));
        assert!(listed[0].updated_at >= conversation.updated_at);
    }

    #[tokio::test]
    async fn test_failed_reply_drops_user_message() {
        let backend = SqliteBackend::in_memory(Arc::new(BrokenAssistant), 20).unwrap();
        backend.seed_demo().await.unwrap();
        let conversation = backend.create_conversation(ids::ANA, None).await.unwrap();

        let events = collect(
            backend
                .send_message(&conversation.id, "Oi")
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ReplyEvent::Accepted(_)));
        let ReplyEvent::Failed(reason) = &events[1] else {
            panic!("expected Failed");
        };
        assert!(reason.contains("503"));
        assert!(backend
            .list_messages(&conversation.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_reply_restores_conversation() {
        let backend = SqliteBackend::in_memory(Arc::new(BrokenAssistant), 20).unwrap();
        backend.seed_demo().await.unwrap();
        let before = backend.list_conversations(ids::ANA).await.unwrap();
        let conversation = backend.create_conversation(ids::ANA, None).await.unwrap();

        let events = collect(
            backend
                .send_message(&conversation.id, "Meu seguro cobre enchente?")
                .await
                .unwrap(),
        )
        .await;
        assert!(matches!(events.last(), Some(ReplyEvent::Failed(_))));

        let after = backend.list_conversations(ids::ANA).await.unwrap();
        let restored = after.iter().find(|c| c.id == conversation.id).unwrap();
        assert_eq!(restored.title, None);
        assert_eq!(
            timestamp(restored.updated_at),
            timestamp(conversation.updated_at)
        );
        assert_eq!(after.len(), before.len() + 1);
    }

    #[tokio::test]
    async fn test_send_to_missing_conversation_fails_up_front() {
        let backend = seeded().await;
        assert!(backend.send_message("missing", "Oi").await.is_err());
        assert!(backend.send_message("missing", "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_policies_active_first() {
        let backend = seeded().await;
        let policies = backend.list_policies(ids::ANA).await.unwrap();
        assert_eq!(policies.len(), 3);
        assert!(policies[0].is_active());
        assert!(!policies[2].is_active());
    }

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let path = std::env::temp_dir().join(format!("luma-chat-{}.db", new_id()));
        {
            let backend = SqliteBackend::open(&path, scripted(), 20).unwrap();
            backend.seed_demo().await.unwrap();
        }
        let reopened = SqliteBackend::open(&path, scripted(), 20).unwrap();
        assert!(reopened.seed_demo().await.unwrap().is_none());
        assert_eq!(reopened.list_policies(ids::ANA).await.unwrap().len(), 3);

        drop(reopened);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
