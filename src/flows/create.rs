//! Distribution creation: validate the form, submit `createDistribution`,
//! wait for the receipt, read the distribution back and hand out one claim
//! link per recipient slot.

use alloy_primitives::{Address, TxHash, U256};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::amount::{AmountError, format_ether, parse_ether};
use crate::contract::{
    Confirmation, ConfirmationPolicy, ContractError, DistributionContract, DistributionInfo,
    await_inclusion,
};

pub const MIN_RECIPIENTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStage {
    Idle,
    Validating,
    Rejected,
    Submitted,
    AwaitingConfirmation,
    Verified,
    VerificationFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct CreationLimits {
    pub max_total_wei: U256,
    pub max_recipients: u32,
}

#[derive(Debug, Clone)]
pub struct CreationForm {
    pub total_amount: String,
    pub recipient_count: u32,
    pub base_names: Vec<String>,
    pub verify_base_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub total_amount: String,
    pub total_wei: U256,
    pub base_names: Vec<String>,
    pub verify_base_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please enter a valid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("Amount must be greater than zero")]
    AmountNotPositive,
    #[error("Amount cannot exceed {ceiling}")]
    AmountExceedsCeiling { ceiling: String },
    #[error("Number of recipients must be between {min} and {max}, got {count}")]
    RecipientCountOutOfRange { count: u32, min: u32, max: u32 },
    #[error("Expected {expected} recipient names, got {actual}")]
    RecipientCountMismatch { expected: u32, actual: usize },
    #[error("Recipient {index} needs a base name")]
    EmptyBaseName { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error(transparent)]
    Invalid(#[from] FormError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[derive(Debug, Clone)]
pub struct CreationOutcome {
    pub distribution_id: String,
    pub tx_hash: TxHash,
    pub stage: CreationStage,
    pub claim_links: Vec<String>,
    /// Why the distribution could not be read back after submission.
    pub unverified_reason: Option<String>,
    pub info: Option<DistributionInfo>,
}

/// Checks every field before anything is sent to the chain.
pub fn validate_form(form: &CreationForm, limits: &CreationLimits) -> Result<ValidatedForm, FormError> {
    let total_wei = parse_ether(&form.total_amount)?;
    if total_wei.is_zero() {
        return Err(FormError::AmountNotPositive);
    }
    if total_wei > limits.max_total_wei {
        return Err(FormError::AmountExceedsCeiling {
            ceiling: format_ether(limits.max_total_wei),
        });
    }

    if form.recipient_count < MIN_RECIPIENTS || form.recipient_count > limits.max_recipients {
        return Err(FormError::RecipientCountOutOfRange {
            count: form.recipient_count,
            min: MIN_RECIPIENTS,
            max: limits.max_recipients,
        });
    }
    if form.base_names.len() != form.recipient_count as usize {
        return Err(FormError::RecipientCountMismatch {
            expected: form.recipient_count,
            actual: form.base_names.len(),
        });
    }

    let mut base_names = Vec::with_capacity(form.base_names.len());
    for (index, name) in form.base_names.iter().enumerate() {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(FormError::EmptyBaseName { index });
        }
        base_names.push(trimmed.to_string());
    }

    Ok(ValidatedForm {
        total_amount: form.total_amount.trim().to_string(),
        total_wei,
        base_names,
        verify_base_name: form.verify_base_name,
    })
}

/// 128 random bits, hex encoded. Not checked against the contract.
pub fn generate_distribution_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn claim_link(origin: &str, distribution_id: &str, index: u64) -> String {
    format!(
        "{}/claim/{}/{}",
        origin.trim_end_matches('/'),
        distribution_id,
        index
    )
}

pub fn claim_links(origin: &str, distribution_id: &str, recipient_count: usize) -> Vec<String> {
    (0..recipient_count as u64)
        .map(|index| claim_link(origin, distribution_id, index))
        .collect()
}

pub struct CreationFlow<'a> {
    contract: &'a dyn DistributionContract,
    policy: ConfirmationPolicy,
    limits: CreationLimits,
    origin: &'a str,
    stage: CreationStage,
}

impl<'a> CreationFlow<'a> {
    pub fn new(
        contract: &'a dyn DistributionContract,
        policy: ConfirmationPolicy,
        limits: CreationLimits,
        origin: &'a str,
    ) -> Self {
        Self {
            contract,
            policy,
            limits,
            origin,
            stage: CreationStage::Idle,
        }
    }

    pub fn stage(&self) -> CreationStage {
        self.stage
    }

    fn advance(&mut self, next: CreationStage) {
        debug!(from = ?self.stage, to = ?next, "Creation flow transition");
        self.stage = next;
    }

    pub async fn submit(
        &mut self,
        creator: Address,
        form: &CreationForm,
    ) -> Result<CreationOutcome, CreationError> {
        self.advance(CreationStage::Validating);
        let validated = match validate_form(form, &self.limits) {
            Ok(validated) => validated,
            Err(err) => {
                self.advance(CreationStage::Rejected);
                return Err(err.into());
            }
        };

        let distribution_id = generate_distribution_id();
        let submitted = match self
            .contract
            .create_distribution(
                creator,
                &distribution_id,
                &validated.base_names,
                validated.verify_base_name,
                &validated.total_amount,
            )
            .await
        {
            Ok(submitted) => submitted,
            Err(err) => {
                self.advance(CreationStage::Idle);
                return Err(err.into());
            }
        };
        self.advance(CreationStage::Submitted);

        let recipient_count = validated.base_names.len();
        let claim_links = claim_links(self.origin, &submitted.distribution_id, recipient_count);

        self.advance(CreationStage::AwaitingConfirmation);
        let (stage, info, unverified_reason) = match self
            .confirm(&submitted.distribution_id, submitted.tx_hash, recipient_count)
            .await
        {
            Ok(info) => (CreationStage::Verified, Some(info), None),
            Err(reason) => {
                warn!(
                    distribution_id = %submitted.distribution_id,
                    tx_hash = %submitted.tx_hash,
                    "Distribution submitted but not verified: {reason}"
                );
                (CreationStage::VerificationFailed, None, Some(reason))
            }
        };
        self.advance(stage);

        if stage == CreationStage::Verified {
            info!(
                distribution_id = %submitted.distribution_id,
                recipients = recipient_count,
                "Distribution created"
            );
        }

        Ok(CreationOutcome {
            distribution_id: submitted.distribution_id,
            tx_hash: submitted.tx_hash,
            stage,
            claim_links,
            unverified_reason,
            info,
        })
    }

    async fn confirm(
        &self,
        distribution_id: &str,
        tx_hash: TxHash,
        recipient_count: usize,
    ) -> Result<DistributionInfo, String> {
        match await_inclusion(self.contract, tx_hash, self.policy).await {
            Ok(Confirmation::Included(_)) => {}
            Ok(Confirmation::Reverted(_)) => return Err("transaction reverted".to_string()),
            Ok(Confirmation::Pending) => {
                return Err("transaction not mined before the confirmation timeout".to_string());
            }
            Err(err) => return Err(err.to_string()),
        }

        let info = self
            .contract
            .get_distribution_info(distribution_id)
            .await
            .map_err(|err| err.to_string())?;
        if !info.exists() {
            return Err("distribution not found after submission".to_string());
        }
        if info.recipient_count != recipient_count as u64 {
            return Err(format!(
                "distribution reports {} recipients, expected {recipient_count}",
                info.recipient_count
            ));
        }
        Ok(info)
    }
}
