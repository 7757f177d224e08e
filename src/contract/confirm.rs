use std::time::Duration;

use alloy_primitives::TxHash;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::ConfirmationConfig;

use super::{ContractError, DistributionContract, TxReceipt};

/// How long to wait for a submitted transaction to be mined.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Included(TxReceipt),
    Reverted(TxReceipt),
    /// No receipt before the timeout.
    Pending,
}

/// Polls for the receipt of `tx_hash` until it is mined or the policy times out.
pub async fn await_inclusion(
    contract: &dyn DistributionContract,
    tx_hash: TxHash,
    policy: ConfirmationPolicy,
) -> Result<Confirmation, ContractError> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Some(receipt) = contract.transaction_receipt(tx_hash).await? {
            debug!(%tx_hash, block = ?receipt.block_number, "Transaction mined");
            return Ok(if receipt.succeeded {
                Confirmation::Included(receipt)
            } else {
                Confirmation::Reverted(receipt)
            });
        }
        if Instant::now() + policy.poll_interval > deadline {
            warn!(%tx_hash, timeout = ?policy.timeout, "No receipt before confirmation timeout");
            return Ok(Confirmation::Pending);
        }
        sleep(policy.poll_interval).await;
    }
}
