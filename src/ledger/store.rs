//! Ledger Store Module
//!
//! Persists one `LedgerRecord` per user per run and the submission intents
//! that make re-running a partially submitted distribution safe.
//!
//! # Tables
//! - `user_chain_payments`: ledger records, newest per user found by `created_at`
//! - `submission_intents`: one row per published manifest, keyed by content id
//! - `submission_intent_records`: which ledger records each manifest carries
//!
//! The store assumes at most one distribution run at a time. Two concurrent
//! runs against the same ledger can double-count deltas.

use crate::error::{LedgerError, UnknownVariant};
use crate::types::{
    IntentState, LedgerRecord, NewLedgerRecord, PaymentStatus, RecordId, SubmissionIntent, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Persistence operations the distribution pipeline needs from the ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Most recent record for `user_id` by creation time, if any
    async fn latest_record(&self, user_id: UserId) -> Result<Option<LedgerRecord>, LedgerError>;

    /// Insert a new record and return it with its assigned id and timestamps
    async fn insert_record(&self, record: NewLedgerRecord) -> Result<LedgerRecord, LedgerError>;

    /// Move every listed record to `status`; returns the number of rows touched
    async fn set_status(&self, ids: &[RecordId], status: PaymentStatus) -> Result<u64, LedgerError>;

    async fn find_intent(&self, manifest_id: &str) -> Result<Option<SubmissionIntent>, LedgerError>;

    /// Record (or reset) a `Published` intent for a manifest about to be submitted
    /// and link it to the ledger records the manifest carries
    async fn record_intent(
        &self,
        manifest_id: &str,
        batch_index: usize,
        task_count: u32,
        record_ids: &[RecordId],
    ) -> Result<SubmissionIntent, LedgerError>;

    /// Ledger records linked to a manifest
    async fn intent_records(&self, manifest_id: &str) -> Result<Vec<RecordId>, LedgerError>;

    /// Most recently updated intent whose manifest carries `record_id`
    async fn intent_for_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<SubmissionIntent>, LedgerError>;

    /// Intents a previous run left half done, oldest first
    ///
    /// That is every `Published` intent (the submit outcome was never
    /// recorded) and every `Submitted` intent that still has `Pending` records.
    async fn unresolved_intents(&self) -> Result<Vec<SubmissionIntent>, LedgerError>;

    async fn update_intent(
        &self,
        manifest_id: &str,
        state: IntentState,
        job_tx_id: Option<&str>,
    ) -> Result<(), LedgerError>;
}

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS user_chain_payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        total_paid INTEGER NOT NULL,
        last_paid_earned_amount INTEGER NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_user_chain_payments_user_created
        ON user_chain_payments (user_id, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS submission_intents (
        manifest_id TEXT PRIMARY KEY,
        batch_index INTEGER NOT NULL,
        task_count INTEGER NOT NULL,
        state TEXT NOT NULL,
        job_tx_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS submission_intent_records (
        manifest_id TEXT NOT NULL,
        record_id INTEGER NOT NULL,
        PRIMARY KEY (manifest_id, record_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_submission_intent_records_record
        ON submission_intent_records (record_id)
    "#,
];

/// SQLite-backed ledger
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Wrap an existing pool; the schema is expected to exist (see `migrate`)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `url`, creating it if missing, and apply the schema
    ///
    /// The pool holds a single connection: a run is strictly sequential, and an
    /// in-memory database only exists on the connection that created it.
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let ledger = Self::new(pool);
        ledger.migrate().await?;
        info!("Ledger connected at {}", url);
        Ok(ledger)
    }

    pub async fn migrate(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All records of a user, oldest first
    pub async fn records_for(&self, user_id: UserId) -> Result<Vec<LedgerRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_paid, last_paid_earned_amount, status, created_at, last_updated_at
            FROM user_chain_payments
            WHERE user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &SqliteRow) -> Result<LedgerRecord, LedgerError> {
    let status: String = row.try_get("status")?;
    Ok(LedgerRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total_paid: row.try_get("total_paid")?,
        last_paid_earned_amount: row.try_get("last_paid_earned_amount")?,
        status: status.parse()?,
        created_at: row.try_get("created_at")?,
        last_updated_at: row.try_get("last_updated_at")?,
    })
}

fn intent_from_row(row: &SqliteRow) -> Result<SubmissionIntent, LedgerError> {
    let state: String = row.try_get("state")?;
    let batch_index: i64 = row.try_get("batch_index")?;
    let task_count: i64 = row.try_get("task_count")?;
    Ok(SubmissionIntent {
        manifest_id: row.try_get("manifest_id")?,
        batch_index: usize::try_from(batch_index)
            .map_err(|_| UnknownVariant::new("batch index", &batch_index.to_string()))?,
        task_count: u32::try_from(task_count)
            .map_err(|_| UnknownVariant::new("task count", &task_count.to_string()))?,
        state: state.parse()?,
        job_tx_id: row.try_get("job_tx_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn latest_record(&self, user_id: UserId) -> Result<Option<LedgerRecord>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_paid, last_paid_earned_amount, status, created_at, last_updated_at
            FROM user_chain_payments
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert_record(&self, record: NewLedgerRecord) -> Result<LedgerRecord, LedgerError> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO user_chain_payments
                (user_id, total_paid, last_paid_earned_amount, status, created_at, last_updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.total_paid)
        .bind(record.last_paid_earned_amount)
        .bind(record.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(LedgerRecord {
            id: result.last_insert_rowid(),
            user_id: record.user_id,
            total_paid: record.total_paid,
            last_paid_earned_amount: record.last_paid_earned_amount,
            status: record.status,
            created_at: now,
            last_updated_at: now,
        })
    }

    async fn set_status(&self, ids: &[RecordId], status: PaymentStatus) -> Result<u64, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut touched = 0;

        for id in ids {
            let result = sqlx::query(
                "UPDATE user_chain_payments SET status = ?, last_updated_at = ? WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            touched += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Marked {} ledger records {}", touched, status);
        Ok(touched)
    }

    async fn find_intent(&self, manifest_id: &str) -> Result<Option<SubmissionIntent>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT manifest_id, batch_index, task_count, state, job_tx_id, created_at, updated_at
            FROM submission_intents
            WHERE manifest_id = ?
            "#,
        )
        .bind(manifest_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(intent_from_row).transpose()
    }

    async fn record_intent(
        &self,
        manifest_id: &str,
        batch_index: usize,
        task_count: u32,
        record_ids: &[RecordId],
    ) -> Result<SubmissionIntent, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO submission_intents
                (manifest_id, batch_index, task_count, state, job_tx_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            ON CONFLICT (manifest_id) DO UPDATE SET
                batch_index = excluded.batch_index,
                task_count = excluded.task_count,
                state = excluded.state,
                job_tx_id = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(manifest_id)
        .bind(batch_index as i64)
        .bind(i64::from(task_count))
        .bind(IntentState::Published.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for record_id in record_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO submission_intent_records (manifest_id, record_id) VALUES (?, ?)",
            )
            .bind(manifest_id)
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.find_intent(manifest_id).await?.ok_or_else(|| {
            LedgerError::Unavailable(format!("intent for {manifest_id} vanished after insert"))
        })
    }

    async fn update_intent(
        &self,
        manifest_id: &str,
        state: IntentState,
        job_tx_id: Option<&str>,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            UPDATE submission_intents
            SET state = ?, job_tx_id = COALESCE(?, job_tx_id), updated_at = ?
            WHERE manifest_id = ?
            "#,
        )
        .bind(state.as_str())
        .bind(job_tx_id)
        .bind(Utc::now())
        .bind(manifest_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn intent_records(&self, manifest_id: &str) -> Result<Vec<RecordId>, LedgerError> {
        let rows = sqlx::query(
            "SELECT record_id FROM submission_intent_records WHERE manifest_id = ? ORDER BY record_id",
        )
        .bind(manifest_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("record_id").map_err(LedgerError::from))
            .collect()
    }

    async fn intent_for_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<SubmissionIntent>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT i.manifest_id, i.batch_index, i.task_count, i.state, i.job_tx_id,
                   i.created_at, i.updated_at
            FROM submission_intents i
            JOIN submission_intent_records l ON l.manifest_id = i.manifest_id
            WHERE l.record_id = ?
            ORDER BY i.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(intent_from_row).transpose()
    }

    async fn unresolved_intents(&self) -> Result<Vec<SubmissionIntent>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT i.manifest_id, i.batch_index, i.task_count, i.state, i.job_tx_id,
                   i.created_at, i.updated_at
            FROM submission_intents i
            WHERE i.state = ?
               OR (i.state = ? AND EXISTS (
                    SELECT 1
                    FROM submission_intent_records l
                    JOIN user_chain_payments p ON p.id = l.record_id
                    WHERE l.manifest_id = i.manifest_id AND p.status = ?
               ))
            ORDER BY i.created_at ASC, i.manifest_id ASC
            "#,
        )
        .bind(IntentState::Published.as_str())
        .bind(IntentState::Submitted.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(intent_from_row).collect()
    }
}
