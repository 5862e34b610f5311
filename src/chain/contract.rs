//! Job Contract Interface
//!
//! The settlement contract stores jobs and drives their lifecycle itself; this
//! module only describes what we can call on it.
//!
//! # Job lifecycle (contract side)
//! ```text
//! Submitted -> Claimed -> Completed
//!                      -> Failed
//! Submitted | Claimed  -> Cancelled
//! ```

use crate::error::ChainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Job status as encoded by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Submitted,
    Claimed,
    Failed,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn code(&self) -> u8 {
        match self {
            JobStatus::Submitted => 11,
            JobStatus::Claimed => 12,
            JobStatus::Failed => 13,
            JobStatus::Completed => 14,
            JobStatus::Cancelled => 15,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Completed | JobStatus::Cancelled)
    }

    /// Whether the contract allows moving a job from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Submitted, JobStatus::Claimed)
                | (JobStatus::Claimed, JobStatus::Completed)
                | (JobStatus::Claimed, JobStatus::Failed)
                | (JobStatus::Submitted, JobStatus::Cancelled)
                | (JobStatus::Claimed, JobStatus::Cancelled)
        )
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = ChainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            11 => Ok(JobStatus::Submitted),
            12 => Ok(JobStatus::Claimed),
            13 => Ok(JobStatus::Failed),
            14 => Ok(JobStatus::Completed),
            15 => Ok(JobStatus::Cancelled),
            other => Err(ChainError::UnknownStatus(other)),
        }
    }
}

/// A job as returned by the contract's view functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: u64,
    pub cid_manifest: String,
    pub creator: String,
    pub status: JobStatus,
    pub task_count: u32,
    pub tip: Option<u64>,
}

/// Entry points of the on-chain job contract
///
/// Every state-changing call is signed by the settlement account and returns
/// the transaction hash as soon as the node accepts it; confirmation is not
/// awaited. Only `submit` is used by a distribution run, the rest are
/// administrative.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobContract: Send + Sync {
    async fn submit(
        &self,
        manifest_id: &str,
        task_count: u32,
        tip: Option<u64>,
    ) -> Result<String, ChainError>;

    async fn claim(&self, job_id: u64) -> Result<String, ChainError>;

    /// Claim the oldest unclaimed job
    async fn claim_first(&self) -> Result<String, ChainError>;

    async fn fail(&self, job_id: u64, task_id: u64) -> Result<String, ChainError>;

    async fn complete(
        &self,
        job_id: u64,
        task_id: u64,
        result_manifest_id: &str,
    ) -> Result<String, ChainError>;

    async fn cancel(&self, job_id: u64) -> Result<String, ChainError>;

    async fn get_jobs(&self) -> Result<Vec<JobView>, ChainError>;

    async fn get_job_status(&self, job_id: u64) -> Result<JobStatus, ChainError>;

    async fn get_jobs_by_creator(
        &self,
        creator: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobView>, ChainError>;

    async fn get_jobs_by_worker(
        &self,
        worker: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobView>, ChainError>;

    /// Whether `worker` holds a task of `job_id` in the given task status
    async fn has_worker(&self, worker: &str, task_status: u8, job_id: u64) -> Result<bool, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 5] = [
        JobStatus::Submitted,
        JobStatus::Claimed,
        JobStatus::Failed,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ];

    #[test]
    fn test_status_codes_round_trip() {
        for status in ALL {
            assert_eq!(JobStatus::try_from(status.code()).unwrap(), status);
        }
        assert!(matches!(JobStatus::try_from(3), Err(ChainError::UnknownStatus(3))));
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Claimed));
        assert!(JobStatus::Claimed.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Claimed.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Claimed.can_transition_to(JobStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(JobStatus::is_terminal) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
            }
        }
        assert!(!JobStatus::Submitted.can_transition_to(JobStatus::Completed));
    }
}
