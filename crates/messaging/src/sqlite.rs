//! SQLite-backed ledger.
//!
//! One row per message; the path is stored as JSON. Indexed on
//! `(to_node, delivered, created_at)` for pending lookups,
//! `(from_node, to_node, created_at)` for history and on `expires_at` for
//! the purge. A row that no longer decodes is skipped by list queries so it
//! cannot block a node's inbox.

use crate::ledger::{LedgerError, LedgerResult, LedgerStats, MessageStore};
use crate::message::{Message, PathHop};
use himesh_core::NodeId;
use himesh_crypto::SealedEnvelope;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

const SELECT_COLUMNS: &str = "id, from_node, to_node, sealed_content, sealed_key, signature, \
     sealed_attachment, has_attachment, priority, message_type, path, hop_count, delivered, \
     delivered_at, failed_attempts, created_at, expires_at";

/// Persistent message ledger
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create a ledger database file
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let ledger = Self::with_connection(conn)?;
        info!(path = %path.display(), "SQLite message ledger opened");
        Ok(ledger)
    }

    /// Volatile database, mainly for tests
    pub fn in_memory() -> LedgerResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> LedgerResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                from_node TEXT NOT NULL,
                to_node TEXT NOT NULL,
                sealed_content TEXT NOT NULL,
                sealed_key TEXT NOT NULL,
                signature TEXT NOT NULL,
                sealed_attachment TEXT,
                has_attachment INTEGER NOT NULL DEFAULT 0,
                priority TEXT NOT NULL,
                message_type TEXT NOT NULL,
                path TEXT NOT NULL,
                hop_count INTEGER NOT NULL,
                delivered INTEGER NOT NULL DEFAULT 0,
                delivered_at INTEGER,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_route
             ON messages(from_node, to_node, created_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_pending
             ON messages(to_node, delivered, created_at)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_expiry ON messages(expires_at)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn query_rows(&self, sql: &str, params: impl rusqlite::Params) -> LedgerResult<Vec<MessageRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, MessageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Decode every row, skipping corrupt ones
    fn query_messages(&self, sql: &str, params: impl rusqlite::Params) -> LedgerResult<Vec<Message>> {
        let rows = self.query_rows(sql, params)?;
        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_message() {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "Skipping corrupt ledger row"),
            }
        }
        Ok(messages)
    }
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger").finish_non_exhaustive()
    }
}

impl MessageStore for SqliteLedger {
    fn create(&self, message: Message) -> LedgerResult<()> {
        let path = serde_json::to_string(&message.path)?;
        let result = self.conn().execute(
            "INSERT INTO messages (id, from_node, to_node, sealed_content, sealed_key, signature,
                sealed_attachment, has_attachment, priority, message_type, path, hop_count,
                delivered, delivered_at, failed_attempts, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                message.id,
                message.from.as_str(),
                message.to.as_str(),
                message.envelope.sealed_content,
                message.envelope.sealed_key,
                message.envelope.signature,
                message.envelope.sealed_attachment,
                message.envelope.has_attachment,
                message.priority.as_str(),
                message.message_type.as_str(),
                path,
                message.hop_count,
                message.delivered,
                message.delivered_at.map(to_sql_ms),
                message.failed_attempts,
                to_sql_ms(message.created_at),
                to_sql_ms(message.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(LedgerError::Duplicate(message.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains_id(&self, id: &str) -> LedgerResult<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get(&self, id: &str, now_ms: u64) -> LedgerResult<Option<Message>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE id = ?1 AND expires_at > ?2");
        self.query_rows(&sql, params![id, to_sql_ms(now_ms)])?
            .into_iter()
            .next()
            .map(MessageRow::into_message)
            .transpose()
    }

    fn pending_for(&self, node_id: &NodeId, now_ms: u64) -> LedgerResult<Vec<Message>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE to_node = ?1 AND delivered = 0 AND expires_at > ?2
             ORDER BY created_at ASC, seq ASC"
        );
        self.query_messages(&sql, params![node_id.as_str(), to_sql_ms(now_ms)])
    }

    fn history_for(&self, node_id: &NodeId, limit: usize, now_ms: u64) -> LedgerResult<Vec<Message>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages
             WHERE (from_node = ?1 OR to_node = ?1) AND expires_at > ?2
             ORDER BY created_at DESC, seq DESC
             LIMIT ?3"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_messages(&sql, params![node_id.as_str(), to_sql_ms(now_ms), limit])
    }

    fn mark_delivered(&self, id: &str, at_ms: u64) -> LedgerResult<bool> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE messages SET delivered = 1, delivered_at = ?2 WHERE id = ?1 AND delivered = 0",
            params![id, to_sql_ms(at_ms)],
        )?;
        if updated > 0 {
            return Ok(true);
        }

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if exists > 0 {
            Ok(false)
        } else {
            Err(LedgerError::NotFound(id.to_string()))
        }
    }

    fn stats(&self, now_ms: u64) -> LedgerResult<LedgerStats> {
        let (total, delivered, critical, with_attachments, hop_sum): (i64, i64, i64, i64, i64) =
            self.conn().query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(delivered), 0),
                        COALESCE(SUM(priority = 'critical'), 0),
                        COALESCE(SUM(has_attachment), 0),
                        COALESCE(SUM(hop_count), 0)
                 FROM messages WHERE expires_at > ?1",
                params![to_sql_ms(now_ms)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        let mut stats = LedgerStats {
            total: total as usize,
            delivered: delivered as usize,
            critical: critical as usize,
            with_attachments: with_attachments as usize,
            ..LedgerStats::default()
        };
        stats.finish(hop_sum as u64);
        Ok(stats)
    }

    fn purge_expired(&self, now_ms: u64) -> LedgerResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM messages WHERE expires_at <= ?1",
            params![to_sql_ms(now_ms)],
        )?;
        Ok(removed)
    }
}

fn to_sql_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Raw column values before domain decoding
struct MessageRow {
    id: String,
    from_node: String,
    to_node: String,
    sealed_content: String,
    sealed_key: String,
    signature: String,
    sealed_attachment: Option<String>,
    has_attachment: bool,
    priority: String,
    message_type: String,
    path: String,
    hop_count: u32,
    delivered: bool,
    delivered_at: Option<i64>,
    failed_attempts: u32,
    created_at: i64,
    expires_at: i64,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_node: row.get(1)?,
            to_node: row.get(2)?,
            sealed_content: row.get(3)?,
            sealed_key: row.get(4)?,
            signature: row.get(5)?,
            sealed_attachment: row.get(6)?,
            has_attachment: row.get(7)?,
            priority: row.get(8)?,
            message_type: row.get(9)?,
            path: row.get(10)?,
            hop_count: row.get(11)?,
            delivered: row.get(12)?,
            delivered_at: row.get(13)?,
            failed_attempts: row.get(14)?,
            created_at: row.get(15)?,
            expires_at: row.get(16)?,
        })
    }

    fn into_message(self) -> LedgerResult<Message> {
        let corrupt = |reason: String| LedgerError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let from = NodeId::parse(&self.from_node).map_err(|e| corrupt(e.to_string()))?;
        let to = NodeId::parse(&self.to_node).map_err(|e| corrupt(e.to_string()))?;
        let priority = self.priority.parse().map_err(|e: himesh_core::ValidationError| corrupt(e.to_string()))?;
        let message_type = self
            .message_type
            .parse()
            .map_err(|e: himesh_core::ValidationError| corrupt(e.to_string()))?;
        let path: Vec<PathHop> = serde_json::from_str(&self.path).map_err(|e| corrupt(e.to_string()))?;

        Ok(Message {
            id: self.id,
            from,
            to,
            envelope: SealedEnvelope {
                sealed_content: self.sealed_content,
                sealed_key: self.sealed_key,
                signature: self.signature,
                sealed_attachment: self.sealed_attachment,
                has_attachment: self.has_attachment,
            },
            priority,
            message_type,
            path,
            hop_count: self.hop_count,
            delivered: self.delivered,
            delivered_at: self.delivered_at.map(|ms| ms as u64),
            failed_attempts: self.failed_attempts,
            created_at: self.created_at as u64,
            expires_at: self.expires_at as u64,
        })
    }
}
