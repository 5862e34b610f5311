//! Ledger Delta Calculator
//!
//! Derives what a user is owed this cycle from their last completed record and
//! their current earned counter, then persists the result as a new `Pending`
//! record. Exactly one record is written per user per run.

use super::LedgerStore;
use crate::error::LedgerError;
use crate::types::{LedgerRecord, NewLedgerRecord, PaymentStatus, UserId};
use std::sync::Arc;
use tracing::debug;

/// Computes and records per-user payment deltas
#[derive(Clone)]
pub struct LedgerDeltaCalculator {
    ledger: Arc<dyn LedgerStore>,
}

impl LedgerDeltaCalculator {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Compute this cycle's delta for a user and persist it as `Pending`
    ///
    /// `total_paid = baseline - current_earned_amount`, where the baseline is
    /// the `last_paid_earned_amount` of the user's most recent record when that
    /// record is `Completed`, and `current_earned_amount` otherwise. The result
    /// can be negative; callers must not assume it is not.
    ///
    /// # Errors
    /// Any ledger failure is returned as is. Deciding whether to skip the user
    /// is the caller's job.
    pub async fn compute_delta(
        &self,
        user_id: UserId,
        current_earned_amount: i64,
    ) -> Result<LedgerRecord, LedgerError> {
        let previous = self.ledger.latest_record(user_id).await?;
        let baseline = baseline_earned_amount(previous.as_ref(), current_earned_amount);
        let total_paid = baseline
            .checked_sub(current_earned_amount)
            .ok_or(LedgerError::Overflow { user_id })?;

        debug!(
            user_id,
            baseline,
            current_earned_amount,
            total_paid,
            previous_status = ?previous.as_ref().map(|r| r.status),
            "Computed ledger delta"
        );

        self.ledger
            .insert_record(NewLedgerRecord {
                user_id,
                total_paid,
                last_paid_earned_amount: baseline,
                status: PaymentStatus::Pending,
            })
            .await
    }
}

/// Baseline earned amount for the next delta
///
/// Only a `Completed` most-recent record moves the baseline; a missing or
/// still-open record leaves it at the current counter, which yields a zero delta.
pub fn baseline_earned_amount(previous: Option<&LedgerRecord>, current_earned_amount: i64) -> i64 {
    match previous {
        Some(record) if record.status == PaymentStatus::Completed => record.last_paid_earned_amount,
        _ => current_earned_amount,
    }
}
