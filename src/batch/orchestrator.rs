//! Distribution Orchestrator Module
//!
//! This module implements the orchestration layer that connects all
//! distribution components together. A run is a single sequential pass.
//!
//! # Architecture Flow
//! 1. Reconcile submission intents an earlier run left half done
//! 2. Sweep users from the `UserSource` (optionally resuming after a checkpoint)
//! 3. Skip users without settings, without a recognized wallet or with a
//!    payout still in flight
//! 4. Compute and persist each remaining user's delta via `LedgerDeltaCalculator`
//! 5. Split the accumulated obligations with `PaymentBatcher`
//! 6. For each batch in order: publish the manifest, record a submission
//!    intent, submit the job, mark the intent and the batch's ledger records
//!    submitted
//!
//! Per-user problems skip that user and are counted in the report. Any
//! failure while publishing or submitting a batch aborts the rest of the run;
//! batches already submitted stay submitted and their receipts stay in the
//! report, including a job that was sent but could not be recorded.

use crate::{
    Batch, IntentState, Manifest, PaymentObligation, PaymentStatus, RunReport, SkipReason,
    SubmissionIntent, SubmissionReceipt, UserAccount, UserId,
    batch::PaymentBatcher,
    chain::ChainJobSubmitter,
    eligibility::EligibilityFilter,
    error::{DistributionError, LedgerError, RunAborted},
    ledger::{LedgerDeltaCalculator, LedgerStore},
    manifest::ManifestPublisher,
    users::UserSource,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Distribution orchestrator
///
/// Owns every collaborator for the duration of a run. Assumes it is the only
/// run working against its ledger.
pub struct DistributionOrchestrator {
    /// Source of accounts and their settings
    users: Arc<dyn UserSource>,
    /// Ledger records and submission intents
    ledger: Arc<dyn LedgerStore>,
    filter: EligibilityFilter,
    calculator: LedgerDeltaCalculator,
    batcher: PaymentBatcher,
    publisher: ManifestPublisher,
    submitter: ChainJobSubmitter,
    /// Users with an id at or below this one are not swept
    resume_after_user: Option<UserId>,
}

impl DistributionOrchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    /// * `users` - Source of eligible accounts and settings
    /// * `ledger` - Ledger store shared by the calculator and intent tracking
    /// * `batcher` - Batcher configured with the batch size
    /// * `publisher` - Manifest publisher holding the content store client
    /// * `submitter` - Job submitter holding the contract client
    pub fn new(
        users: Arc<dyn UserSource>,
        ledger: Arc<dyn LedgerStore>,
        batcher: PaymentBatcher,
        publisher: ManifestPublisher,
        submitter: ChainJobSubmitter,
    ) -> Self {
        Self {
            users,
            calculator: LedgerDeltaCalculator::new(ledger.clone()),
            ledger,
            filter: EligibilityFilter::default(),
            batcher,
            publisher,
            submitter,
            resume_after_user: None,
        }
    }

    pub fn with_filter(mut self, filter: EligibilityFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn resume_after(mut self, user_id: Option<UserId>) -> Self {
        self.resume_after_user = user_id;
        self
    }

    /// Run one distribution pass
    ///
    /// # Returns
    /// * `Ok(RunReport)` when every batch was published and submitted
    /// * `Err(RunAborted)` carrying the partial report when reconciliation, the
    ///   user listing, a publish, a submission or its bookkeeping failed
    pub async fn run(&self) -> Result<RunReport, RunAborted> {
        info!("Distribution run starting (batch size {})", self.batcher.size());
        if let Some(user_id) = self.resume_after_user {
            info!("Resuming sweep after user {}", user_id);
        }

        let mut report = RunReport::default();
        if let Err(source) = self.reconcile(&mut report).await {
            error!("Failed to reconcile earlier submissions: {}", source);
            return Err(RunAborted {
                batch_index: None,
                report,
                source,
            });
        }

        let obligations = match self.sweep(&mut report).await {
            Ok(obligations) => obligations,
            Err(source) => {
                error!("Failed to list users: {}", source);
                return Err(RunAborted {
                    batch_index: None,
                    report,
                    source,
                });
            }
        };
        report.attempted = obligations.len();

        let batches = self.batcher.batch(obligations);
        info!(
            "Computed {} obligations ({} users skipped) in {} batches",
            report.attempted,
            report.skipped_total(),
            batches.len()
        );

        for batch in &batches {
            let settled = match self.settle(batch).await {
                Ok(Some(receipt)) => {
                    // The job is on chain from here on, whatever the ledger says
                    let recorded = self.record_submission(batch, &receipt).await;
                    report.receipts.push(receipt);
                    recorded
                }
                Ok(None) => {
                    report.batches_already_submitted += 1;
                    Ok(())
                }
                Err(source) => Err(source),
            };

            if let Err(source) = settled {
                error!(
                    "Batch #{} failed, aborting remaining {} batches: {}",
                    batch.index,
                    batches.len() - batch.index - 1,
                    source
                );
                return Err(RunAborted {
                    batch_index: Some(batch.index),
                    report,
                    source,
                });
            }
        }

        info!(
            "Distribution run finished: {} obligations, {} jobs submitted, skipped {:?}",
            report.attempted,
            report.receipts.len(),
            report.skipped
        );
        Ok(report)
    }

    /// Settle intents whose submission an earlier run did not finish recording
    ///
    /// A `Published` intent is looked up on chain: if the contract holds a job
    /// for the manifest, the intent and its records become `Submitted`,
    /// otherwise they become `Failed`. A `Submitted` intent with records still
    /// `Pending` only needs its records marked.
    async fn reconcile(&self, report: &mut RunReport) -> Result<(), DistributionError> {
        let intents = self.ledger.unresolved_intents().await?;
        if intents.is_empty() {
            return Ok(());
        }
        warn!("Found {} unresolved submission intents", intents.len());

        for intent in intents {
            self.resolve(&intent).await?;
            report.intents_reconciled += 1;
        }
        Ok(())
    }

    async fn resolve(&self, intent: &SubmissionIntent) -> Result<(), DistributionError> {
        let record_ids = self.ledger.intent_records(&intent.manifest_id).await?;

        let status = match intent.state {
            IntentState::Submitted => PaymentStatus::Submitted,
            IntentState::Failed => PaymentStatus::Failed,
            IntentState::Published => {
                match self.submitter.find_job(&intent.manifest_id).await? {
                    Some(job) => {
                        info!(
                            "Manifest {} was submitted as job {} before the last run stopped",
                            intent.manifest_id, job.job_id
                        );
                        self.ledger
                            .update_intent(&intent.manifest_id, IntentState::Submitted, None)
                            .await?;
                        PaymentStatus::Submitted
                    }
                    None => {
                        info!(
                            "Manifest {} never reached the contract, releasing its records",
                            intent.manifest_id
                        );
                        self.ledger
                            .update_intent(&intent.manifest_id, IntentState::Failed, None)
                            .await?;
                        PaymentStatus::Failed
                    }
                }
            }
        };

        self.ledger.set_status(&record_ids, status).await?;
        Ok(())
    }

    /// Visit every user once and collect their obligations in sweep order
    async fn sweep(&self, report: &mut RunReport) -> Result<Vec<PaymentObligation>, DistributionError> {
        let accounts = self
            .users
            .accounts()
            .await
            .map_err(DistributionError::UserSource)?;

        let mut obligations = Vec::new();
        for account in accounts {
            if self.resume_after_user.is_some_and(|checkpoint| account.id <= checkpoint) {
                continue;
            }
            report.last_user_id = Some(account.id);

            match self.obligation_for(&account).await {
                Ok(obligation) => obligations.push(obligation),
                Err(reason) => report.record_skip(reason),
            }
        }

        Ok(obligations)
    }

    async fn obligation_for(&self, account: &UserAccount) -> Result<PaymentObligation, SkipReason> {
        debug!("Processing user {}:{}", account.id, account.username);

        let settings = match self.users.settings(account.id).await {
            Ok(Some(settings)) if !settings.is_empty() => settings,
            Ok(_) => {
                debug!("User {} has no settings saved, skipping", account.id);
                return Err(SkipReason::MissingSettings);
            }
            Err(e) => {
                warn!("Could not load settings for user {}: {}", account.id, e);
                return Err(SkipReason::SettingsUnavailable);
            }
        };

        if !self.filter.is_eligible(&settings) {
            debug!("User {} has no web3 wallet saved, skipping", account.id);
            return Err(SkipReason::NoWallet);
        }

        match self.payout_in_flight(account.id).await {
            Ok(false) => {}
            Ok(true) => {
                debug!("User {} has a payout in flight, skipping", account.id);
                return Err(SkipReason::InFlight);
            }
            Err(e) => {
                error!("Error reading ledger for user {}: {}", account.id, e);
                return Err(SkipReason::LedgerWrite);
            }
        }

        let record = self
            .calculator
            .compute_delta(account.id, account.earned_amount_total)
            .await
            .map_err(|e| {
                error!("Error creating user payment for user {}: {}", account.id, e);
                SkipReason::LedgerWrite
            })?;

        Ok(PaymentObligation::from_record(&record, self.filter.wallets(&settings)))
    }

    /// Whether the user's latest record belongs to a job that was sent and
    /// has not settled
    async fn payout_in_flight(&self, user_id: UserId) -> Result<bool, DistributionError> {
        let Some(latest) = self.ledger.latest_record(user_id).await? else {
            return Ok(false);
        };

        Ok(match latest.status {
            PaymentStatus::Submitted => true,
            PaymentStatus::Pending => self
                .ledger
                .intent_for_record(latest.id)
                .await?
                .is_some_and(|intent| intent.state != IntentState::Failed),
            PaymentStatus::Completed | PaymentStatus::Failed => false,
        })
    }

    /// Publish and submit one batch
    ///
    /// # Returns
    /// * `Ok(Some(receipt))` after a fresh submission
    /// * `Ok(None)` if this exact manifest was already submitted by an earlier run
    ///
    /// Recording a fresh submission is left to `record_submission` so the
    /// receipt reaches the report even when that bookkeeping fails.
    async fn settle(&self, batch: &Batch) -> Result<Option<SubmissionReceipt>, DistributionError> {
        let manifest = self.publisher.publish(batch).await?;

        if let Some(intent) = self.ledger.find_intent(&manifest.id).await? {
            if intent.state == IntentState::Submitted {
                warn!(
                    "Manifest {} was already submitted (job {:?}), not submitting again",
                    manifest.id, intent.job_tx_id
                );
                self.ledger
                    .set_status(&batch.record_ids(), PaymentStatus::Submitted)
                    .await?;
                return Ok(None);
            }
        }

        let task_count = self.submitter.task_count(&manifest)?;
        self.ledger
            .record_intent(&manifest.id, batch.index, task_count, &batch.record_ids())
            .await?;

        match self
            .submitter
            .submit(&manifest.id, task_count, self.submitter.tip())
            .await
        {
            Ok(receipt) => Ok(Some(receipt)),
            Err(e) => {
                self.mark_failed(batch, &manifest).await;
                Err(e.into())
            }
        }
    }

    /// Mark a freshly submitted batch's intent and records `Submitted`
    ///
    /// On failure the intent or records are left behind for the next run's
    /// reconciliation.
    async fn record_submission(
        &self,
        batch: &Batch,
        receipt: &SubmissionReceipt,
    ) -> Result<(), DistributionError> {
        let logged = |e: &LedgerError| {
            error!(
                "Job {} for manifest {} was sent but could not be recorded: {}",
                receipt.job_tx_id, receipt.manifest_id, e
            )
        };

        self.ledger
            .update_intent(&receipt.manifest_id, IntentState::Submitted, Some(&receipt.job_tx_id))
            .await
            .inspect_err(logged)?;
        self.ledger
            .set_status(&batch.record_ids(), PaymentStatus::Submitted)
            .await
            .inspect_err(logged)?;
        Ok(())
    }

    /// Record a failed submission; the run is aborting either way
    async fn mark_failed(&self, batch: &Batch, manifest: &Manifest) {
        if let Err(e) = self
            .ledger
            .update_intent(&manifest.id, IntentState::Failed, None)
            .await
        {
            warn!("Could not mark intent for {} failed: {}", manifest.id, e);
        }
        if let Err(e) = self
            .ledger
            .set_status(&batch.record_ids(), PaymentStatus::Failed)
            .await
        {
            warn!("Could not mark batch #{} records failed: {}", batch.index, e);
        }
    }
}
