//! Access to the on-chain distribution contract.
//!
//! Every operation is a single fresh JSON-RPC round trip. Nothing is cached
//! and nothing is retried; failures come back as one flat error carrying the
//! provider's message and code.

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::amount::{AmountError, parse_ether};
use crate::rpc::{RpcClient, RpcFailure};

mod confirm;
#[cfg(test)]
pub(crate) mod testing;

pub use confirm::{Confirmation, ConfirmationPolicy, await_inclusion};

sol! {
    function createDistribution(string distributionId, string[] baseNames, bool verifyBaseName) external payable;
    function claimShare(string distributionId, uint256 recipientIndex, string baseName) external;
    function getDistributionInfo(string distributionId) external view returns (address creator, uint256 amountPerRecipient, bool verifyBaseName, uint256 recipientCount);
    function isShareClaimed(string distributionId, uint256 index) external view returns (bool);
    function getBaseName(string distributionId, uint256 index) external view returns (string);
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Must have at least one recipient")]
    NoRecipients,
    #[error("Invalid total amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("Contract write failed: {message}")]
    WriteFailed { message: String, code: Option<i32> },
    #[error("Contract read failed: {message}")]
    ReadFailed { message: String, code: Option<i32> },
}

impl ContractError {
    fn write(failure: RpcFailure) -> Self {
        Self::WriteFailed {
            message: failure.message,
            code: failure.code,
        }
    }

    fn read(failure: RpcFailure) -> Self {
        Self::ReadFailed {
            message: failure.message,
            code: failure.code,
        }
    }

    fn undecodable(call: &str, err: alloy_sol_types::Error) -> Self {
        Self::ReadFailed {
            message: format!("{call} returned undecodable data: {err}"),
            code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionInfo {
    pub creator: Address,
    pub amount_per_recipient: U256,
    pub verify_base_name: bool,
    pub recipient_count: u64,
}

impl DistributionInfo {
    /// Unknown ids read back as an all-zero record.
    pub fn exists(&self) -> bool {
        self.creator != Address::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCreation {
    pub distribution_id: String,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub succeeded: bool,
}

#[async_trait]
pub trait DistributionContract: Send + Sync {
    async fn create_distribution(
        &self,
        creator: Address,
        distribution_id: &str,
        base_names: &[String],
        verify_base_name: bool,
        total_amount: &str,
    ) -> Result<SubmittedCreation, ContractError>;

    async fn claim_share(
        &self,
        claimant: Address,
        distribution_id: &str,
        recipient_index: u64,
        base_name: &str,
    ) -> Result<TxHash, ContractError>;

    async fn get_distribution_info(
        &self,
        distribution_id: &str,
    ) -> Result<DistributionInfo, ContractError>;

    async fn is_share_claimed(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<bool, ContractError>;

    async fn get_base_name(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<String, ContractError>;

    async fn transaction_receipt(&self, tx_hash: TxHash)
    -> Result<Option<TxReceipt>, ContractError>;

    async fn block_number(&self) -> Result<u64, ContractError>;
}

/// Local checks shared by every `createDistribution` submission: at least
/// one recipient, and the decimal total converted to wei.
pub fn creation_value(base_names: &[String], total_amount: &str) -> Result<U256, ContractError> {
    if base_names.is_empty() {
        return Err(ContractError::NoRecipients);
    }
    Ok(parse_ether(total_amount)?)
}

/// The deployed Shagun contract reached through a JSON-RPC wallet provider.
#[derive(Clone)]
pub struct ShagunContract {
    rpc: RpcClient,
    address: Address,
}

impl ShagunContract {
    pub fn new(rpc: RpcClient, address: Address) -> Self {
        assert!(address != Address::ZERO, "Contract address must be set");
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read<C: SolCall>(&self, call: C) -> Result<C::Return, ContractError> {
        let output = self
            .rpc
            .call(self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(ContractError::read)?;
        C::abi_decode_returns(&output, true).map_err(|err| ContractError::undecodable(C::SIGNATURE, err))
    }
}

#[async_trait]
impl DistributionContract for ShagunContract {
    async fn create_distribution(
        &self,
        creator: Address,
        distribution_id: &str,
        base_names: &[String],
        verify_base_name: bool,
        total_amount: &str,
    ) -> Result<SubmittedCreation, ContractError> {
        let value = creation_value(base_names, total_amount)?;
        let call = createDistributionCall {
            distributionId: distribution_id.to_string(),
            baseNames: base_names.to_vec(),
            verifyBaseName: verify_base_name,
        };

        let tx_hash = self
            .rpc
            .send_transaction(creator, self.address, Bytes::from(call.abi_encode()), value)
            .await
            .map_err(ContractError::write)?;
        info!(
            distribution_id,
            recipients = base_names.len(),
            %tx_hash,
            "Submitted createDistribution"
        );

        Ok(SubmittedCreation {
            distribution_id: distribution_id.to_string(),
            tx_hash,
        })
    }

    async fn claim_share(
        &self,
        claimant: Address,
        distribution_id: &str,
        recipient_index: u64,
        base_name: &str,
    ) -> Result<TxHash, ContractError> {
        let call = claimShareCall {
            distributionId: distribution_id.to_string(),
            recipientIndex: U256::from(recipient_index),
            baseName: base_name.to_string(),
        };
        let tx_hash = self
            .rpc
            .send_transaction(claimant, self.address, Bytes::from(call.abi_encode()), U256::ZERO)
            .await
            .map_err(ContractError::write)?;
        info!(distribution_id, recipient_index, %tx_hash, "Submitted claimShare");
        Ok(tx_hash)
    }

    async fn get_distribution_info(
        &self,
        distribution_id: &str,
    ) -> Result<DistributionInfo, ContractError> {
        let decoded = self
            .read(getDistributionInfoCall {
                distributionId: distribution_id.to_string(),
            })
            .await?;
        let recipient_count = u64::try_from(decoded.recipientCount).map_err(|_| {
            ContractError::ReadFailed {
                message: format!("recipient count {} exceeds u64", decoded.recipientCount),
                code: None,
            }
        })?;
        debug!(distribution_id, recipient_count, "Read distribution info");
        Ok(DistributionInfo {
            creator: decoded.creator,
            amount_per_recipient: decoded.amountPerRecipient,
            verify_base_name: decoded.verifyBaseName,
            recipient_count,
        })
    }

    async fn is_share_claimed(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<bool, ContractError> {
        let decoded = self
            .read(isShareClaimedCall {
                distributionId: distribution_id.to_string(),
                index: U256::from(recipient_index),
            })
            .await?;
        Ok(decoded._0)
    }

    async fn get_base_name(
        &self,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Result<String, ContractError> {
        let decoded = self
            .read(getBaseNameCall {
                distributionId: distribution_id.to_string(),
                index: U256::from(recipient_index),
            })
            .await?;
        Ok(decoded._0)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TxReceipt>, ContractError> {
        let receipt = self
            .rpc
            .transaction_receipt(tx_hash)
            .await
            .map_err(ContractError::read)?;
        Ok(receipt.map(|payload| TxReceipt {
            tx_hash: payload.transaction_hash,
            block_number: payload.block(),
            succeeded: payload.succeeded(),
        }))
    }

    async fn block_number(&self) -> Result<u64, ContractError> {
        self.rpc.block_number().await.map_err(ContractError::read)
    }
}
