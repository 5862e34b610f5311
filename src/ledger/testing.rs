//! In-memory ledger for tests

use super::LedgerStore;
use crate::error::LedgerError;
use crate::types::{
    IntentState, LedgerRecord, NewLedgerRecord, PaymentStatus, RecordId, SubmissionIntent, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    records: Vec<LedgerRecord>,
    intents: HashMap<String, SubmissionIntent>,
    links: HashMap<String, Vec<RecordId>>,
    failing_users: HashSet<UserId>,
    fail_status_updates: bool,
    fail_intent_updates: bool,
    next_id: RecordId,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    /// Insert a record with the given baseline and status, bypassing the calculator
    pub fn seed(&self, user_id: UserId, last_paid_earned_amount: i64, status: PaymentStatus) -> LedgerRecord {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let record = LedgerRecord {
            id: state.next_id,
            user_id,
            total_paid: 0,
            last_paid_earned_amount,
            status,
            created_at: now,
            last_updated_at: now,
        };
        state.records.push(record.clone());
        record
    }

    /// Make every read or write for `user_id` fail
    pub fn fail_writes_for(&self, user_id: UserId) {
        self.state.lock().unwrap().failing_users.insert(user_id);
    }

    /// Make `set_status` fail until switched back off
    pub fn fail_status_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_status_updates = fail;
    }

    /// Make `update_intent` fail until switched back off
    pub fn fail_intent_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_intent_updates = fail;
    }

    pub fn records_for(&self, user_id: UserId) -> Vec<LedgerRecord> {
        let state = self.state.lock().unwrap();
        state.records.iter().filter(|r| r.user_id == user_id).cloned().collect()
    }

    pub fn record(&self, id: RecordId) -> Option<LedgerRecord> {
        let state = self.state.lock().unwrap();
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub fn intent(&self, manifest_id: &str) -> Option<SubmissionIntent> {
        self.state.lock().unwrap().intents.get(manifest_id).cloned()
    }

    fn check(&self, user_id: UserId) -> Result<(), LedgerError> {
        if self.state.lock().unwrap().failing_users.contains(&user_id) {
            return Err(LedgerError::Unavailable(format!("write refused for user {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn latest_record(&self, user_id: UserId) -> Result<Option<LedgerRecord>, LedgerError> {
        self.check(user_id)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn insert_record(&self, record: NewLedgerRecord) -> Result<LedgerRecord, LedgerError> {
        self.check(record.user_id)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let now = Utc::now();
        let stored = LedgerRecord {
            id: state.next_id,
            user_id: record.user_id,
            total_paid: record.total_paid,
            last_paid_earned_amount: record.last_paid_earned_amount,
            status: record.status,
            created_at: now,
            last_updated_at: now,
        };
        state.records.push(stored.clone());
        Ok(stored)
    }

    async fn set_status(&self, ids: &[RecordId], status: PaymentStatus) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_status_updates {
            return Err(LedgerError::Unavailable("status update refused".to_string()));
        }
        let mut touched = 0;
        for record in state.records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.status = status;
            record.last_updated_at = Utc::now();
            touched += 1;
        }
        Ok(touched)
    }

    async fn find_intent(&self, manifest_id: &str) -> Result<Option<SubmissionIntent>, LedgerError> {
        Ok(self.intent(manifest_id))
    }

    async fn record_intent(
        &self,
        manifest_id: &str,
        batch_index: usize,
        task_count: u32,
        record_ids: &[RecordId],
    ) -> Result<SubmissionIntent, LedgerError> {
        let now = Utc::now();
        let intent = SubmissionIntent {
            manifest_id: manifest_id.to_string(),
            batch_index,
            task_count,
            state: IntentState::Published,
            job_tx_id: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.intents.insert(manifest_id.to_string(), intent.clone());
        let links = state.links.entry(manifest_id.to_string()).or_default();
        for id in record_ids {
            if !links.contains(id) {
                links.push(*id);
            }
        }
        Ok(intent)
    }

    async fn update_intent(
        &self,
        manifest_id: &str,
        state: IntentState,
        job_tx_id: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut guard = self.state.lock().unwrap();
        if guard.fail_intent_updates {
            return Err(LedgerError::Unavailable("intent update refused".to_string()));
        }
        if let Some(intent) = guard.intents.get_mut(manifest_id) {
            intent.state = state;
            if let Some(tx) = job_tx_id {
                intent.job_tx_id = Some(tx.to_string());
            }
            intent.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn intent_records(&self, manifest_id: &str) -> Result<Vec<RecordId>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state.links.get(manifest_id).cloned().unwrap_or_default())
    }

    async fn intent_for_record(
        &self,
        record_id: RecordId,
    ) -> Result<Option<SubmissionIntent>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .links
            .iter()
            .filter(|(_, ids)| ids.contains(&record_id))
            .filter_map(|(manifest_id, _)| state.intents.get(manifest_id))
            .max_by_key(|intent| intent.updated_at)
            .cloned())
    }

    async fn unresolved_intents(&self) -> Result<Vec<SubmissionIntent>, LedgerError> {
        let state = self.state.lock().unwrap();
        let has_pending = |manifest_id: &str| {
            state.links.get(manifest_id).is_some_and(|ids| {
                state
                    .records
                    .iter()
                    .any(|r| ids.contains(&r.id) && r.status == PaymentStatus::Pending)
            })
        };
        let mut unresolved: Vec<SubmissionIntent> = state
            .intents
            .values()
            .filter(|intent| match intent.state {
                IntentState::Published => true,
                IntentState::Submitted => has_pending(&intent.manifest_id),
                IntentState::Failed => false,
            })
            .cloned()
            .collect();
        unresolved.sort_by(|a, b| {
            (a.created_at, &a.manifest_id).cmp(&(b.created_at, &b.manifest_id))
        });
        Ok(unresolved)
    }
}
