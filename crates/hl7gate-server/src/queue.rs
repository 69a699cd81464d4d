//! SQLite-backed durable FIFO queue.
//!
//! Every received frame is stored as one row before its sender is released,
//! so nothing is lost while the downstream consumer is slow or down. Rows
//! are delivered strictly by ascending id and are only removed after the
//! consumer has seen them.
//!
//! The queue holds one connection behind a mutex. Each operation is one
//! statement or one transaction and runs on the blocking thread pool.
//!
//! Only one task may run `peek`/`dequeue` cycles at a time; enqueueing is
//! safe from any number of tasks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{BoxError, QueueError, QueueResult};

/// Default number of items handed to the consumer per round.
pub const DEFAULT_BATCH_SIZE: usize = 2048;

/// Default table name.
pub const DEFAULT_TABLE: &str = "hl7_queue";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// SQLite database file, created if missing.
    pub path: PathBuf,
    /// Table holding the queue rows.
    pub table: String,
    /// Items peeked per `process_all` round.
    pub batch_size: usize,
}

impl QueueConfig {
    /// Creates a configuration for the given database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Builder: set table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Builder: set batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// One stored frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    /// Store-assigned id, strictly increasing, never reused.
    pub sequence_id: i64,
    /// Raw frame text.
    pub payload: String,
}

#[derive(Debug)]
struct Inner {
    conn: Mutex<Connection>,
    table: String,
    batch_size: usize,
    path: PathBuf,
}

/// Handle to a durable queue. Cloning shares the same connection.
#[derive(Debug, Clone)]
pub struct DurableQueue {
    inner: Arc<Inner>,
}

fn validate_table_name(name: &str) -> QueueResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(QueueError::invalid_table_name(name))
    }
}

impl DurableQueue {
    /// Opens the queue, creating the database file and table when absent.
    pub async fn open(config: QueueConfig) -> QueueResult<Self> {
        tokio::task::spawn_blocking(move || Self::open_blocking(config)).await?
    }

    /// Synchronous variant of [`open`](Self::open) for non-async callers.
    pub fn open_blocking(config: QueueConfig) -> QueueResult<Self> {
        validate_table_name(&config.table)?;

        let conn = Connection::open(&config.path)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, payload TEXT NOT NULL)",
            config.table
        ))?;

        info!(
            path = %config.path.display(),
            table = %config.table,
            "Durable queue opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                table: config.table,
                batch_size: config.batch_size.max(1),
                path: config.path,
            }),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.inner.table
    }

    /// Runs one storage call on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&mut Connection, &str) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = inner.conn.lock().map_err(|_| QueueError::Poisoned)?;
            f(&mut conn, &inner.table).map_err(QueueError::from)
        })
        .await?
    }

    /// Appends a payload and returns its sequence id.
    pub async fn enqueue(&self, payload: impl Into<String>) -> QueueResult<i64> {
        let payload = payload.into();
        self.with_conn(move |conn, table| {
            conn.execute(
                &format!("INSERT INTO {table} (payload) VALUES (?1)"),
                params![payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Number of queued items.
    pub async fn count(&self) -> QueueResult<u64> {
        self.with_conn(|conn, table| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|count| count.max(0) as u64)
        })
        .await
    }

    /// Up to `limit` leading items, without removing them.
    pub async fn peek(&self, limit: usize) -> QueueResult<Vec<QueueItem>> {
        self.with_conn(move |conn, table| select_front(conn, table, limit))
            .await
    }

    /// Removes up to `limit` leading items in one transaction and returns them.
    pub async fn dequeue(&self, limit: usize) -> QueueResult<Vec<QueueItem>> {
        self.with_conn(move |conn, table| {
            let tx = conn.transaction()?;
            let items = select_front(&tx, table, limit)?;
            if let Some(last) = items.last() {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE id <= ?1"),
                    params![last.sequence_id],
                )?;
            }
            tx.commit()?;
            Ok(items)
        })
        .await
    }

    /// Removes every item with `sequence_id <= watermark`.
    ///
    /// Returns the number of rows removed.
    pub async fn dequeue_through(&self, watermark: i64) -> QueueResult<usize> {
        self.with_conn(move |conn, table| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE id <= ?1"),
                params![watermark],
            )
        })
        .await
    }

    /// Oldest item, without removing it.
    pub async fn peek_front(&self) -> QueueResult<Option<QueueItem>> {
        self.with_conn(|conn, table| {
            conn.query_row(
                &format!("SELECT id, payload FROM {table} ORDER BY id LIMIT 1"),
                [],
                |row| {
                    Ok(QueueItem {
                        sequence_id: row.get(0)?,
                        payload: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Removes and returns the oldest item.
    pub async fn dequeue_front(&self) -> QueueResult<Option<QueueItem>> {
        self.with_conn(|conn, table| {
            let tx = conn.transaction()?;
            let item = tx
                .query_row(
                    &format!("SELECT id, payload FROM {table} ORDER BY id LIMIT 1"),
                    [],
                    |row| {
                        Ok(QueueItem {
                            sequence_id: row.get(0)?,
                            payload: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            if let Some(ref item) = item {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE id = ?1"),
                    params![item.sequence_id],
                )?;
            }
            tx.commit()?;
            Ok(item)
        })
        .await
    }

    /// Whether an item with exactly this payload is queued.
    pub async fn contains(&self, payload: impl Into<String>) -> QueueResult<bool> {
        let payload = payload.into();
        self.with_conn(move |conn, table| {
            conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE payload = ?1)"),
                params![payload],
                |row| row.get::<_, bool>(0),
            )
        })
        .await
    }

    /// Removes every item. Returns the number removed.
    pub async fn clear(&self) -> QueueResult<usize> {
        let removed = self
            .with_conn(|conn, table| conn.execute(&format!("DELETE FROM {table}"), []))
            .await?;
        warn!(removed, table = %self.inner.table, "Queue cleared");
        Ok(removed)
    }

    /// Hands one batch of leading items to `callback`, in order.
    ///
    /// On full success the whole batch is removed. On the first failure only
    /// the items that succeeded are removed and the failure is returned as
    /// [`QueueError::Callback`]. Returns the number of items in the batch;
    /// zero means the queue was empty.
    pub async fn process_all<F, Fut, E>(&self, mut callback: F) -> QueueResult<usize>
    where
        F: FnMut(QueueItem) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Into<BoxError>,
    {
        let batch = self.peek(self.inner.batch_size).await?;
        let available = batch.len();
        let mut watermark = None;

        for item in batch {
            let sequence_id = item.sequence_id;
            if let Err(err) = callback(item).await {
                if let Some(last_ok) = watermark {
                    self.dequeue_through(last_ok).await?;
                }
                return Err(QueueError::callback(sequence_id, err));
            }
            watermark = Some(sequence_id);
        }

        if let Some(last) = watermark {
            let removed = self.dequeue_through(last).await?;
            debug!(removed, watermark = last, "Batch processed");
        }

        Ok(available)
    }
}

fn select_front(conn: &Connection, table: &str, limit: usize) -> rusqlite::Result<Vec<QueueItem>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(&format!(
        "SELECT id, payload FROM {table} ORDER BY id LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(QueueItem {
            sequence_id: row.get(0)?,
            payload: row.get(1)?,
        })
    })?;
    rows.collect()
}
