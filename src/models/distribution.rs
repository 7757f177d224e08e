use serde::{Deserialize, Serialize};

use crate::flows::claim::{ClaimStage, ClaimStatus};
use crate::flows::create::CreationStage;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDistributionRequest {
    pub creator: String,
    pub total_amount: String,
    pub recipient_count: u32,
    pub base_names: Vec<String>,
    #[serde(default)]
    pub verify_base_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationView {
    pub distribution_id: String,
    pub tx_hash: String,
    pub explorer_url: Option<String>,
    pub stage: CreationStage,
    pub claim_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionView {
    pub distribution_id: String,
    pub creator: String,
    /// Wei, decimal.
    pub amount_per_recipient: String,
    pub amount_per_recipient_display: String,
    pub verify_base_name: bool,
    pub recipient_count: u64,
    pub claim_links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimView {
    pub distribution_id: String,
    pub recipient_index: u64,
    pub base_name: String,
    pub claimed: bool,
    pub verify_base_name: bool,
    pub expected_address: Option<String>,
    pub amount_per_recipient: String,
    pub amount_per_recipient_display: String,
    pub creator: String,
    pub stage: ClaimStage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletRequest {
    pub wallet_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOwnershipRequest {
    pub wallet_address: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeView {
    pub wallet_address: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipView {
    pub wallet_address: String,
    pub verified: bool,
    pub verified_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutcomeView {
    pub distribution_id: String,
    pub recipient_index: u64,
    pub tx_hash: String,
    pub explorer_url: Option<String>,
    pub stage: ClaimStage,
    #[serde(flatten)]
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNameView {
    pub address: String,
}
