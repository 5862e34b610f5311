//! Chain Job Submitter Module
//!
//! Performs the single contract transition a distribution run needs: entering
//! a job for a published manifest in the `Submitted` state. Failures are not
//! retried; they abort the run. Also finds the job behind a manifest when an
//! earlier run lost track of its submit outcome.

use super::{JobContract, JobView};
use crate::error::ChainError;
use crate::{Manifest, SubmissionReceipt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// What one task of a submitted job stands for
///
/// # Modes
/// - `PerObligation`: every manifest entry is an independently claimable task,
///   so the task count equals the number of obligations in the batch
/// - `PerBatch`: the whole manifest is one task (task count is always 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCountMode {
    #[default]
    PerObligation,
    PerBatch,
}

impl TaskCountMode {
    /// Task count for a manifest holding `entries` obligations
    pub fn task_count(&self, entries: usize) -> Result<u32, ChainError> {
        match self {
            TaskCountMode::PerObligation => {
                u32::try_from(entries).map_err(|_| ChainError::TaskCountOverflow(entries))
            }
            TaskCountMode::PerBatch => Ok(1),
        }
    }
}

/// Submits settlement jobs referencing published manifests
#[derive(Clone)]
pub struct ChainJobSubmitter {
    contract: Arc<dyn JobContract>,
    mode: TaskCountMode,
    tip: Option<u64>,
}

impl ChainJobSubmitter {
    /// # Arguments
    /// * `contract` - Job contract client, signed by the settlement account
    /// * `mode` - Meaning of a task relative to a batch
    /// * `tip` - Tip attached to every job this submitter creates
    pub fn new(contract: Arc<dyn JobContract>, mode: TaskCountMode, tip: Option<u64>) -> Self {
        Self { contract, mode, tip }
    }

    pub fn tip(&self) -> Option<u64> {
        self.tip
    }

    pub fn task_count(&self, manifest: &Manifest) -> Result<u32, ChainError> {
        self.mode.task_count(manifest.entry_count)
    }

    /// Submit a job for `manifest_id` and return its receipt
    ///
    /// # Errors
    /// Signing and network failures propagate unchanged.
    pub async fn submit(
        &self,
        manifest_id: &str,
        task_count: u32,
        tip: Option<u64>,
    ) -> Result<SubmissionReceipt, ChainError> {
        let job_tx_id = self.contract.submit(manifest_id, task_count, tip).await?;

        info!(
            "Submitted job {} for manifest {} ({} tasks, tip {:?})",
            job_tx_id, manifest_id, task_count, tip
        );

        Ok(SubmissionReceipt {
            job_tx_id,
            manifest_id: manifest_id.to_string(),
            task_count,
            tip,
        })
    }

    /// Look up the job created for `manifest_id`, if the contract holds one
    ///
    /// Used to settle intents whose submit outcome was never recorded.
    pub async fn find_job(&self, manifest_id: &str) -> Result<Option<JobView>, ChainError> {
        let jobs = self.contract.get_jobs().await?;
        Ok(jobs.into_iter().find(|job| job.cid_manifest == manifest_id))
    }
}
