use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownVariant;

/// Identifier of a user in the external user store
pub type UserId = i64;

/// Identifier of a ledger record (the payment id carried into manifests)
pub type RecordId = i64;

/// Lifecycle of a ledger record
///
/// Records are created `Pending`. The distribution run moves a record to
/// `Submitted` once its batch's job transaction is accepted, or `Failed` when
/// the submission for its batch fails. `Completed` is only ever written by the
/// external settlement confirmation process and is the only state used as a
/// baseline for the next delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Submitted,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Submitted => "SUBMITTED",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUBMITTED" => Ok(PaymentStatus::Submitted),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

/// Durable per-cycle payment record for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: RecordId,
    pub user_id: UserId,
    /// Delta computed for this cycle. May be negative.
    pub total_paid: i64,
    /// Earned-counter snapshot as of the last completed record
    pub last_paid_earned_amount: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Ledger record before the store has assigned it an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerRecord {
    pub user_id: UserId,
    pub total_paid: i64,
    pub last_paid_earned_amount: i64,
    pub status: PaymentStatus,
}

/// Eligible account yielded by the user source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    /// Cumulative earned counter at the time of the sweep
    pub earned_amount_total: i64,
}

/// Free-form per-user settings (string key to string value)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSettings {
    pub user_id: UserId,
    pub values: HashMap<String, String>,
}

impl UserSettings {
    pub fn new(user_id: UserId, values: HashMap<String, String>) -> Self {
        Self { user_id, values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One user's computed payment for the current run
///
/// Owned by the run and never persisted directly; only the underlying
/// ledger record is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentObligation {
    pub user_id: UserId,
    pub amount: i64,
    pub ledger_record_id: RecordId,
    /// Chain name (`move`, `ton`) to wallet address
    pub wallets: BTreeMap<String, String>,
    pub status: PaymentStatus,
}

impl PaymentObligation {
    pub fn from_record(record: &LedgerRecord, wallets: BTreeMap<String, String>) -> Self {
        Self {
            user_id: record.user_id,
            amount: record.total_paid,
            ledger_record_id: record.id,
            wallets,
            status: record.status,
        }
    }
}

/// Ordered, bounded group of obligations published and submitted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch within the run
    pub index: usize,
    pub obligations: Vec<PaymentObligation>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.obligations.iter().map(|o| o.ledger_record_id).collect()
    }
}

/// Plain record written to the manifest for each obligation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub user_id: UserId,
    pub amount: i64,
    pub payment_id: RecordId,
    pub wallets: BTreeMap<String, String>,
    pub status: PaymentStatus,
}

impl From<&PaymentObligation> for ManifestEntry {
    fn from(obligation: &PaymentObligation) -> Self {
        Self {
            user_id: obligation.user_id,
            amount: obligation.amount,
            payment_id: obligation.ledger_record_id,
            wallets: obligation.wallets.clone(),
            status: obligation.status,
        }
    }
}

/// A published batch: its content identifier plus what it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Content identifier returned by the store
    pub id: String,
    /// Display name the store recorded for the blob
    pub name: String,
    pub batch_index: usize,
    pub entry_count: usize,
}

/// Result of a successful job submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub job_tx_id: String,
    pub manifest_id: String,
    pub task_count: u32,
    pub tip: Option<u64>,
}

/// Progress of a manifest towards the job contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentState {
    Published,
    Submitted,
    Failed,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentState::Published => "PUBLISHED",
            IntentState::Submitted => "SUBMITTED",
            IntentState::Failed => "FAILED",
        }
    }
}

impl FromStr for IntentState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLISHED" => Ok(IntentState::Published),
            "SUBMITTED" => Ok(IntentState::Submitted),
            "FAILED" => Ok(IntentState::Failed),
            other => Err(UnknownVariant::new("intent state", other)),
        }
    }
}

/// Durable record that a manifest was published and is (or was) being submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionIntent {
    pub manifest_id: String,
    pub batch_index: usize,
    pub task_count: u32,
    pub state: IntentState,
    pub job_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why a user was left out of this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user has no settings saved
    MissingSettings,
    /// Settings exist but hold no recognized wallet key
    NoWallet,
    /// The settings lookup itself failed
    SettingsUnavailable,
    /// Reading the prior record or writing the new one failed
    LedgerWrite,
    /// The user's previous payout was submitted and has not settled yet
    InFlight,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::MissingSettings => "missing settings",
            SkipReason::NoWallet => "no wallet",
            SkipReason::SettingsUnavailable => "settings unavailable",
            SkipReason::LedgerWrite => "ledger write failed",
            SkipReason::InFlight => "payout in flight",
        };
        f.write_str(reason)
    }
}

/// Outcome of one distribution run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Obligations computed during the sweep
    pub attempted: usize,
    /// Users excluded from the run, counted by reason
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Receipts of the batches submitted so far, in batch order
    pub receipts: Vec<SubmissionReceipt>,
    /// Batches whose manifest had already been submitted by an earlier run
    pub batches_already_submitted: usize,
    /// Intents left half done by an earlier run and resolved before the sweep
    pub intents_reconciled: usize,
    /// Last user visited by the sweep, usable as the next `resume_after_user`
    pub last_user_id: Option<UserId>,
}

impl RunReport {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}
