//! EVM Job Contract Client
//!
//! Calls the job contract through ethers-rs. Transactions are signed locally
//! with the settlement key and sent one at a time; the signer's nonce is
//! fetched per send, so callers must not submit concurrently from the same
//! account.

use super::{JobContract, JobStatus, JobView};
use crate::error::ChainError;
use async_trait::async_trait;
use ethers::abi::{Detokenize, Tokenize, parse_abi};
use ethers::contract::Contract;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, info};

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Raw job tuple: (id, cid_manifest, creator, status, task_count, tip)
type JobTuple = (u64, String, Address, u8, u32, u64);

/// Human-readable ABI of the job contract
///
/// An absent tip is encoded as 0; optional status filters are a
/// `(bool filterStatus, uint8 status)` pair.
const JOB_ABI: &[&str] = &[
    "function submit(string cidManifest, uint32 taskCount, uint64 tip)",
    "function claim(uint64 jobId)",
    "function claimFirst()",
    "function fail(uint64 jobId, uint64 taskId)",
    "function complete(uint64 jobId, uint64 taskId, string cidResult)",
    "function cancel(uint64 jobId)",
    "function getJobs() view returns ((uint64,string,address,uint8,uint32,uint64)[])",
    "function getJobStatus(uint64 jobId) view returns (uint8)",
    "function getJobsByCreator(address creator, bool filterStatus, uint8 status) view returns ((uint64,string,address,uint8,uint32,uint64)[])",
    "function getJobsByWorker(address worker, bool filterStatus, uint8 status) view returns ((uint64,string,address,uint8,uint32,uint64)[])",
    "function hasWorker(address worker, uint8 taskStatus, uint64 jobId) view returns (bool)",
];

/// Job contract client backed by an HTTP JSON-RPC provider
pub struct EvmJobContract {
    contract: Contract<SignerClient>,
}

impl EvmJobContract {
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint of the settlement chain
    /// * `contract_address` - Address of the deployed job contract
    /// * `wallet` - Settlement account, already bound to the chain id
    pub fn new(rpc_url: &str, contract_address: &str, wallet: LocalWallet) -> Result<Self, ChainError> {
        let provider =
            Provider::<Http>::try_from(rpc_url).map_err(|e| ChainError::Provider(e.to_string()))?;
        let address = parse_address(contract_address)?;
        let abi = parse_abi(JOB_ABI).map_err(|e| ChainError::Contract {
            call: "abi",
            reason: e.to_string(),
        })?;

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        info!("Job contract client ready for {:?} at {}", address, rpc_url);

        Ok(Self {
            contract: Contract::new(address, abi, client),
        })
    }

    /// Sign and send a state-changing call; returns the transaction hash
    async fn send<T: Tokenize + Send>(&self, call: &'static str, args: T) -> Result<String, ChainError> {
        let method = self
            .contract
            .method::<T, ()>(call, args)
            .map_err(|e| contract_error(call, e))?;
        let pending = method.send().await.map_err(|e| contract_error(call, e))?;
        let tx_hash = format!("{:?}", pending.tx_hash());

        debug!(call, tx_hash = %tx_hash, "Job contract transaction sent");
        Ok(tx_hash)
    }

    async fn view<T, D>(&self, call: &'static str, args: T) -> Result<D, ChainError>
    where
        T: Tokenize + Send,
        D: Detokenize + Send + Sync,
    {
        self.contract
            .method::<T, D>(call, args)
            .map_err(|e| contract_error(call, e))?
            .call()
            .await
            .map_err(|e| contract_error(call, e))
    }

    async fn jobs_filtered(
        &self,
        call: &'static str,
        account: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobView>, ChainError> {
        let account = parse_address(account)?;
        let (filter, code) = match status {
            Some(status) => (true, status.code()),
            None => (false, 0),
        };
        let jobs: Vec<JobTuple> = self.view(call, (account, filter, code)).await?;
        jobs.into_iter().map(job_view).collect()
    }
}

fn contract_error(call: &'static str, error: impl std::fmt::Display) -> ChainError {
    ChainError::Contract {
        call,
        reason: error.to_string(),
    }
}

fn parse_address(address: &str) -> Result<Address, ChainError> {
    address
        .parse()
        .map_err(|_| ChainError::InvalidAddress(address.to_string()))
}

fn job_view((job_id, cid_manifest, creator, status, task_count, tip): JobTuple) -> Result<JobView, ChainError> {
    Ok(JobView {
        job_id,
        cid_manifest,
        creator: format!("{creator:?}"),
        status: JobStatus::try_from(status)?,
        task_count,
        tip: (tip != 0).then_some(tip),
    })
}

#[async_trait]
impl JobContract for EvmJobContract {
    async fn submit(
        &self,
        manifest_id: &str,
        task_count: u32,
        tip: Option<u64>,
    ) -> Result<String, ChainError> {
        self.send("submit", (manifest_id.to_string(), task_count, tip.unwrap_or(0)))
            .await
    }

    async fn claim(&self, job_id: u64) -> Result<String, ChainError> {
        self.send("claim", (job_id,)).await
    }

    async fn claim_first(&self) -> Result<String, ChainError> {
        self.send("claimFirst", ()).await
    }

    async fn fail(&self, job_id: u64, task_id: u64) -> Result<String, ChainError> {
        self.send("fail", (job_id, task_id)).await
    }

    async fn complete(
        &self,
        job_id: u64,
        task_id: u64,
        result_manifest_id: &str,
    ) -> Result<String, ChainError> {
        self.send("complete", (job_id, task_id, result_manifest_id.to_string()))
            .await
    }

    async fn cancel(&self, job_id: u64) -> Result<String, ChainError> {
        self.send("cancel", (job_id,)).await
    }

    async fn get_jobs(&self) -> Result<Vec<JobView>, ChainError> {
        let jobs: Vec<JobTuple> = self.view("getJobs", ()).await?;
        jobs.into_iter().map(job_view).collect()
    }

    async fn get_job_status(&self, job_id: u64) -> Result<JobStatus, ChainError> {
        let code: u8 = self.view("getJobStatus", (job_id,)).await?;
        JobStatus::try_from(code)
    }

    async fn get_jobs_by_creator(
        &self,
        creator: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobView>, ChainError> {
        self.jobs_filtered("getJobsByCreator", creator, status).await
    }

    async fn get_jobs_by_worker(
        &self,
        worker: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobView>, ChainError> {
        self.jobs_filtered("getJobsByWorker", worker, status).await
    }

    async fn has_worker(&self, worker: &str, task_status: u8, job_id: u64) -> Result<bool, ChainError> {
        let worker = parse_address(worker)?;
        self.view("hasWorker", (worker, task_status, job_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_declares_every_entry_point() {
        let abi = parse_abi(JOB_ABI).unwrap();

        for name in [
            "submit",
            "claim",
            "claimFirst",
            "fail",
            "complete",
            "cancel",
            "getJobs",
            "getJobStatus",
            "getJobsByCreator",
            "getJobsByWorker",
            "hasWorker",
        ] {
            assert!(abi.function(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_job_view_maps_zero_tip_to_none() {
        let view = job_view((3, "bafy".to_string(), Address::zero(), 11, 10, 0)).unwrap();

        assert_eq!(view.job_id, 3);
        assert_eq!(view.status, JobStatus::Submitted);
        assert_eq!(view.tip, None);
    }

    #[test]
    fn test_job_view_rejects_unknown_status() {
        let result = job_view((1, String::new(), Address::zero(), 99, 1, 5));

        assert!(matches!(result, Err(ChainError::UnknownStatus(99))));
    }

    #[test]
    fn test_invalid_contract_address_is_rejected() {
        let wallet: LocalWallet = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            .parse()
            .unwrap();

        let result = EvmJobContract::new("http://localhost:8545", "not-an-address", wallet);

        assert!(matches!(result, Err(ChainError::InvalidAddress(_))));
    }
}
