use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, TxHash, U256, keccak256};
use async_trait::async_trait;

use super::{
    ContractError, DistributionContract, DistributionInfo, SubmittedCreation, TxReceipt,
    creation_value,
};

struct MockDistribution {
    creator: Address,
    amount_per_recipient: U256,
    verify_base_name: bool,
    base_names: Vec<String>,
    claimed: Vec<bool>,
}

struct PendingTx {
    polls_remaining: u32,
    succeeded: bool,
}

#[derive(Default)]
struct MockState {
    distributions: HashMap<String, MockDistribution>,
    receipts: HashMap<TxHash, PendingTx>,
    nonce: u64,
    reads: usize,
    writes: usize,
    reads_fail: bool,
    writes_fail: bool,
    writes_dropped: bool,
    writes_revert: bool,
    reported_recipient_count: Option<u64>,
    polls_until_mined: u32,
}

impl MockState {
    fn next_tx(&mut self, succeeded: bool) -> TxHash {
        self.nonce += 1;
        let tx_hash = keccak256(self.nonce.to_be_bytes());
        self.receipts.insert(
            tx_hash,
            PendingTx {
                polls_remaining: self.polls_until_mined,
                succeeded,
            },
        );
        tx_hash
    }

    fn begin_read(&mut self) -> Result<(), ContractError> {
        self.reads += 1;
        if self.reads_fail {
            return Err(ContractError::ReadFailed {
                message: "connection refused".to_string(),
                code: None,
            });
        }
        Ok(())
    }

    /// Whether a mined write changes contract state.
    fn write_applies(&self) -> bool {
        !self.writes_dropped && !self.writes_revert
    }

    fn begin_write(&mut self) -> Result<(), ContractError> {
        self.writes += 1;
        if self.writes_fail {
            return Err(ContractError::WriteFailed {
                message: "User rejected the request.".to_string(),
                code: Some(4001),
            });
        }
        Ok(())
    }
}

/// In-memory stand-in for the deployed contract and its node.
#[derive(Default)]
pub struct MockContract {
    state: Mutex<MockState>,
}

impl MockContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_distribution(
        &self,
        id: &str,
        creator: Address,
        amount_per_recipient: U256,
        verify_base_name: bool,
        base_names: &[&str],
    ) {
        let mut state = self.state.lock().unwrap();
        state.distributions.insert(
            id.to_string(),
            MockDistribution {
                creator,
                amount_per_recipient,
                verify_base_name,
                base_names: base_names.iter().map(|name| name.to_string()).collect(),
                claimed: vec![false; base_names.len()],
            },
        );
    }

    pub fn mark_claimed(&self, id: &str, index: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some(distribution) = state.distributions.get_mut(id) {
            distribution.claimed[index] = true;
        }
    }

    pub fn register_pending_tx(&self, polls_until_mined: u32, succeeded: bool) -> TxHash {
        let mut state = self.state.lock().unwrap();
        state.polls_until_mined = polls_until_mined;
        let tx_hash = state.next_tx(succeeded);
        state.polls_until_mined = 0;
        tx_hash
    }

    pub fn set_reads_fail(&self, fail: bool) {
        self.state.lock().unwrap().reads_fail = fail;
    }

    pub fn set_writes_fail(&self, fail: bool) {
        self.state.lock().unwrap().writes_fail = fail;
    }

    /// Writes are accepted and mined but leave contract state untouched.
    pub fn set_writes_dropped(&self, dropped: bool) {
        self.state.lock().unwrap().writes_dropped = dropped;
    }

    /// Writes are mined with a failed status and leave state untouched.
    pub fn set_writes_revert(&self, revert: bool) {
        self.state.lock().unwrap().writes_revert = revert;
    }

    /// Overrides the recipient count reported by `getDistributionInfo`.
    pub fn set_reported_recipient_count(&self, count: Option<u64>) {
        self.state.lock().unwrap().reported_recipient_count = count;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn only_distribution_id(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        if state.distributions.len() != 1 {
            return None;
        }
        state.distributions.keys().next().cloned()
    }
}

#[async_trait]
impl DistributionContract for MockContract {
    async fn create_distribution(
        &self,
        creator: Address,
        distribution_id: &str,
        base_names: &[String],
        verify_base_name: bool,
        total_amount: &str,
    ) -> Result<SubmittedCreation, ContractError> {
        let value = creation_value(base_names, total_amount)?;
        let mut state = self.state.lock().unwrap();
        state.begin_write()?;
        if state.write_applies() {
            state.distributions.insert(
                distribution_id.to_string(),
                MockDistribution {
                    creator,
                    amount_per_recipient: value / U256::from(base_names.len()),
                    verify_base_name,
                    base_names: base_names.to_vec(),
                    claimed: vec![false; base_names.len()],
                },
            );
        }
        let succeeded = !state.writes_revert;
        let tx_hash = state.next_tx(succeeded);
        Ok(SubmittedCreation {
            distribution_id: distribution_id.to_string(),
            tx_hash,
        })
    }

    async fn claim_share(
        &self,
        _claimant: Address,
        distribution_id: &str,
        recipient_index: u64,
        _base_name: &str,
    ) -> Result<TxHash, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.begin_write()?;
        let applies = state.write_applies();
        let succeeded = !state.writes_revert;
        let slot = state
            .distributions
            .get_mut(distribution_id)
            .and_then(|distribution| distribution.claimed.get_mut(recipient_index as usize))
            .ok_or_else(|| ContractError::WriteFailed {
                message: "execution reverted: invalid recipient".to_string(),
                code: Some(3),
            })?;
        if *slot {
            return Err(ContractError::WriteFailed {
                message: "execution reverted: already claimed".to_string(),
                code: Some(3),
            });
        }
        if applies {
            *slot = true;
        }
        Ok(state.next_tx(succeeded))
    }

    async fn get_distribution_info(
        &self,
        distribution_id: &str,
    ) -> Result<DistributionInfo, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.begin_read()?;
        let reported = state.reported_recipient_count;
        Ok(match state.distributions.get(distribution_id) {
            Some(distribution) => DistributionInfo {
                creator: distribution.creator,
                amount_per_recipient: distribution.amount_per_recipient,
                verify_base_name: distribution.verify_base_name,
                recipient_count: reported.unwrap_or(distribution.base_names.len() as u64),
            },
            None => DistributionInfo {
                creator: Address::ZERO,
                amount_per_recipient: U256::ZERO,
                verify_base_name: false,
                recipient_count: 0,
            },
        })
    }

    async fn is_share_claimed(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<bool, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.begin_read()?;
        Ok(state
            .distributions
            .get(distribution_id)
            .and_then(|distribution| distribution.claimed.get(recipient_index as usize))
            .copied()
            .unwrap_or(false))
    }

    async fn get_base_name(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<String, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.begin_read()?;
        Ok(state
            .distributions
            .get(distribution_id)
            .and_then(|distribution| distribution.base_names.get(recipient_index as usize))
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TxReceipt>, ContractError> {
        let mut state = self.state.lock().unwrap();
        let Some(pending) = state.receipts.get_mut(&tx_hash) else {
            return Ok(None);
        };
        if pending.polls_remaining > 0 {
            pending.polls_remaining -= 1;
            return Ok(None);
        }
        Ok(Some(TxReceipt {
            tx_hash,
            block_number: Some(1),
            succeeded: pending.succeeded,
        }))
    }

    async fn block_number(&self) -> Result<u64, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.begin_read()?;
        Ok(state.nonce)
    }
}
