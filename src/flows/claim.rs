//! Claiming one recipient slot of a distribution.
//!
//! When the distribution requires base name verification the slot's name is
//! resolved to the address allowed to claim, and the claimant must sign the
//! ownership challenge with that wallet before `claimShare` is submitted.

use alloy_primitives::{Address, TxHash};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contract::{
    Confirmation, ConfirmationPolicy, ContractError, DistributionContract, DistributionInfo,
    await_inclusion,
};
use crate::ownership::{OwnershipError, challenge_message, verify_ownership};
use crate::resolver::{NameResolver, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStage {
    Loading,
    Ready,
    SignatureRequested,
    SignatureVerified,
    Claiming,
    Claimed,
    /// Submitted, but the receipt or the claimed flag did not confirm it.
    SubmittedUnverified,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Distribution not found")]
    DistributionNotFound,
    #[error("Recipient index {index} is out of range for {count} recipients")]
    IndexOutOfRange { index: u64, count: u64 },
    #[error("Distribution information has not been loaded")]
    NotLoaded,
    #[error("This share has already been claimed")]
    AlreadyClaimed,
    #[error("Connected wallet is not authorized to claim this share")]
    WalletNotAuthorized { wallet: Address, expected: Address },
    #[error("Please verify your wallet ownership first")]
    SignatureRequired,
    #[error("Could not resolve base name: {0}")]
    Resolution(#[from] ResolveError),
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Everything known about the slot once it has been loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSlot {
    pub distribution_id: String,
    pub recipient_index: u64,
    pub info: DistributionInfo,
    pub base_name: String,
    pub claimed: bool,
    /// Only set when the distribution requires verification.
    pub expected_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimStatus {
    Claimed,
    SubmittedUnverified { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub tx_hash: TxHash,
    pub status: ClaimStatus,
}

pub struct ClaimFlow<'a> {
    contract: &'a dyn DistributionContract,
    resolver: &'a dyn NameResolver,
    policy: ConfirmationPolicy,
    distribution_id: String,
    recipient_index: u64,
    stage: ClaimStage,
    slot: Option<ClaimSlot>,
    signature_verified: bool,
}

impl<'a> ClaimFlow<'a> {
    pub fn new(
        contract: &'a dyn DistributionContract,
        resolver: &'a dyn NameResolver,
        policy: ConfirmationPolicy,
        distribution_id: &str,
        recipient_index: u64,
    ) -> Self {
        Self {
            contract,
            resolver,
            policy,
            distribution_id: distribution_id.to_string(),
            recipient_index,
            stage: ClaimStage::Loading,
            slot: None,
            signature_verified: false,
        }
    }

    pub fn stage(&self) -> ClaimStage {
        self.stage
    }

    pub fn slot(&self) -> Option<&ClaimSlot> {
        self.slot.as_ref()
    }

    fn advance(&mut self, next: ClaimStage) {
        debug!(
            distribution_id = %self.distribution_id,
            index = self.recipient_index,
            from = ?self.stage,
            to = ?next,
            "Claim flow transition"
        );
        self.stage = next;
    }

    fn fail<T>(&mut self, err: ClaimError) -> Result<T, ClaimError> {
        self.advance(ClaimStage::Error);
        Err(err)
    }

    pub async fn load(&mut self) -> Result<&ClaimSlot, ClaimError> {
        self.advance(ClaimStage::Loading);
        match self.fetch_slot().await {
            Ok(slot) => {
                let claimed = slot.claimed;
                self.slot = Some(slot);
                self.advance(if claimed {
                    ClaimStage::Claimed
                } else if self.signature_verified {
                    ClaimStage::SignatureVerified
                } else {
                    ClaimStage::Ready
                });
                self.slot.as_ref().ok_or(ClaimError::NotLoaded)
            }
            Err(err) => self.fail(err),
        }
    }

    async fn fetch_slot(&self) -> Result<ClaimSlot, ClaimError> {
        let info = self
            .contract
            .get_distribution_info(&self.distribution_id)
            .await?;
        if !info.exists() {
            return Err(ClaimError::DistributionNotFound);
        }
        if self.recipient_index >= info.recipient_count {
            return Err(ClaimError::IndexOutOfRange {
                index: self.recipient_index,
                count: info.recipient_count,
            });
        }

        let claimed = self
            .contract
            .is_share_claimed(&self.distribution_id, self.recipient_index)
            .await?;
        let base_name = self
            .contract
            .get_base_name(&self.distribution_id, self.recipient_index)
            .await?;

        // A claimed slot is terminal; its owner no longer matters.
        let expected_address = if info.verify_base_name && !claimed {
            Some(self.resolver.resolve(&base_name).await?)
        } else {
            None
        };

        Ok(ClaimSlot {
            distribution_id: self.distribution_id.clone(),
            recipient_index: self.recipient_index,
            info,
            base_name,
            claimed,
            expected_address,
        })
    }

    /// Fails unless `wallet` may claim the loaded slot.
    pub fn authorize(&self, wallet: &Address) -> Result<&ClaimSlot, ClaimError> {
        let slot = self.slot.as_ref().ok_or(ClaimError::NotLoaded)?;
        if slot.claimed {
            return Err(ClaimError::AlreadyClaimed);
        }
        if let Some(expected) = slot.expected_address {
            if expected != *wallet {
                return Err(ClaimError::WalletNotAuthorized {
                    wallet: *wallet,
                    expected,
                });
            }
        }
        Ok(slot)
    }

    /// Returns the message the wallet has to sign.
    pub fn request_signature(&mut self, wallet: &Address) -> Result<String, ClaimError> {
        if let Err(err) = self.authorize(wallet) {
            return self.fail(err);
        }
        self.advance(ClaimStage::SignatureRequested);
        Ok(challenge_message(wallet, &self.distribution_id))
    }

    pub fn verify_signature(&mut self, wallet: &Address, signature: &str) -> Result<(), ClaimError> {
        if let Err(err) = self.authorize(wallet) {
            return self.fail(err);
        }
        if let Err(err) = verify_ownership(wallet, &self.distribution_id, signature) {
            warn!(
                distribution_id = %self.distribution_id,
                %wallet,
                "Signature verification failed: {err}"
            );
            return self.fail(err.into());
        }
        self.mark_signature_verified();
        Ok(())
    }

    /// Restores a signature check that already passed earlier in the session.
    pub fn mark_signature_verified(&mut self) {
        self.signature_verified = true;
        if self.slot.as_ref().is_some_and(|slot| !slot.claimed) {
            self.advance(ClaimStage::SignatureVerified);
        }
    }

    pub fn signature_verified(&self) -> bool {
        self.signature_verified
    }

    pub async fn claim(&mut self, wallet: &Address) -> Result<ClaimOutcome, ClaimError> {
        let slot = match self.authorize(wallet) {
            Ok(slot) => slot.clone(),
            Err(err) => return self.fail(err),
        };
        if slot.claimed {
            return self.fail(ClaimError::AlreadyClaimed);
        }
        if slot.info.verify_base_name && !self.signature_verified {
            return self.fail(ClaimError::SignatureRequired);
        }

        self.advance(ClaimStage::Claiming);
        let tx_hash = match self
            .contract
            .claim_share(
                *wallet,
                &self.distribution_id,
                self.recipient_index,
                &slot.base_name,
            )
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(err) => return self.fail(err.into()),
        };

        let status = match self.confirm(tx_hash).await {
            Ok(()) => {
                if let Some(slot) = self.slot.as_mut() {
                    slot.claimed = true;
                }
                self.advance(ClaimStage::Claimed);
                info!(
                    distribution_id = %self.distribution_id,
                    index = self.recipient_index,
                    %wallet,
                    %tx_hash,
                    "Share claimed"
                );
                ClaimStatus::Claimed
            }
            Err(reason) => {
                warn!(
                    distribution_id = %self.distribution_id,
                    index = self.recipient_index,
                    %tx_hash,
                    "Claim submitted but not verified: {reason}"
                );
                self.advance(ClaimStage::SubmittedUnverified);
                ClaimStatus::SubmittedUnverified { reason }
            }
        };

        Ok(ClaimOutcome { tx_hash, status })
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<(), String> {
        match await_inclusion(self.contract, tx_hash, self.policy).await {
            Ok(Confirmation::Included(_)) => {}
            Ok(Confirmation::Reverted(_)) => return Err("transaction reverted".to_string()),
            Ok(Confirmation::Pending) => {
                return Err("transaction not mined before the confirmation timeout".to_string());
            }
            Err(err) => return Err(err.to_string()),
        }
        let claimed = self
            .contract
            .is_share_claimed(&self.distribution_id, self.recipient_index)
            .await
            .map_err(|err| err.to_string())?;
        if claimed {
            Ok(())
        } else {
            Err("share still reads as unclaimed".to_string())
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::U256;

    use super::test_support::StaticResolver;
    use super::*;
    use crate::contract::testing::MockContract;
    use crate::ownership::test_support::TestWallet;

    const DIST: &str = "5f2c0e7a";

    fn policy() -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(100),
        }
    }

    struct Fixture {
        contract: MockContract,
        resolver: StaticResolver,
        alice: TestWallet,
        bob: TestWallet,
    }

    fn fixture(verify: bool) -> Fixture {
        let alice = TestWallet::from_seed(1);
        let bob = TestWallet::from_seed(2);
        let contract = MockContract::new();
        contract.insert_distribution(
            DIST,
            Address::repeat_byte(0xc0),
            U256::from(10u8),
            verify,
            &["alice.base.eth", "bob.base.eth"],
        );
        let resolver = StaticResolver::default()
            .with("alice.base.eth", alice.address())
            .with("bob.base.eth", bob.address());
        Fixture {
            contract,
            resolver,
            alice,
            bob,
        }
    }

    fn flow<'a>(fx: &'a Fixture, index: u64) -> ClaimFlow<'a> {
        ClaimFlow::new(&fx.contract, &fx.resolver, policy(), DIST, index)
    }

    #[tokio::test]
    async fn load_resolves_expected_address() {
        let fx = fixture(true);
        let mut flow = flow(&fx, 1);
        let slot = flow.load().await.unwrap().clone();
        assert_eq!(slot.base_name, "bob.base.eth");
        assert_eq!(slot.expected_address, Some(fx.bob.address()));
        assert!(!slot.claimed);
        assert_eq!(flow.stage(), ClaimStage::Ready);
    }

    #[tokio::test]
    async fn verified_owner_claims_share() {
        let fx = fixture(true);
        let mut flow = flow(&fx, 0);
        flow.load().await.unwrap();

        let wallet = fx.alice.address();
        let message = flow.request_signature(&wallet).unwrap();
        assert_eq!(flow.stage(), ClaimStage::SignatureRequested);
        flow.verify_signature(&wallet, &fx.alice.personal_sign(&message))
            .unwrap();
        assert_eq!(flow.stage(), ClaimStage::SignatureVerified);

        let outcome = flow.claim(&wallet).await.unwrap();
        assert_eq!(outcome.status, ClaimStatus::Claimed);
        assert_eq!(flow.stage(), ClaimStage::Claimed);
        assert!(fx.contract.is_share_claimed(DIST, 0).await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_wallet_is_blocked_even_with_valid_signature() {
        let fx = fixture(true);
        let mut flow = flow(&fx, 0);
        flow.load().await.unwrap();

        let intruder = fx.bob.address();
        let message = challenge_message(&intruder, DIST);
        let signature = fx.bob.personal_sign(&message);
        assert!(matches!(
            flow.verify_signature(&intruder, &signature),
            Err(ClaimError::WalletNotAuthorized { .. })
        ));
        assert!(matches!(
            flow.request_signature(&intruder),
            Err(ClaimError::WalletNotAuthorized { .. })
        ));

        flow.mark_signature_verified();
        assert!(matches!(
            flow.claim(&intruder).await,
            Err(ClaimError::WalletNotAuthorized { .. })
        ));
        assert_eq!(flow.stage(), ClaimStage::Error);
        assert_eq!(fx.contract.writes(), 0);
    }

    #[tokio::test]
    async fn claim_without_signature_is_refused() {
        let fx = fixture(true);
        let mut flow = flow(&fx, 0);
        flow.load().await.unwrap();
        assert!(matches!(
            flow.claim(&fx.alice.address()).await,
            Err(ClaimError::SignatureRequired)
        ));
        assert_eq!(fx.contract.writes(), 0);
    }

    #[tokio::test]
    async fn forged_signature_is_refused() {
        let fx = fixture(true);
        let mut flow = flow(&fx, 0);
        flow.load().await.unwrap();
        let wallet = fx.alice.address();
        let message = flow.request_signature(&wallet).unwrap();
        let forged = fx.bob.personal_sign(&message);
        assert!(matches!(
            flow.verify_signature(&wallet, &forged),
            Err(ClaimError::Ownership(OwnershipError::SignerMismatch { .. }))
        ));
        assert!(!flow.signature_verified());
    }

    #[tokio::test]
    async fn claimed_slot_is_not_resubmitted() {
        let fx = fixture(false);
        fx.contract.mark_claimed(DIST, 1);
        let mut flow = flow(&fx, 1);
        let slot = flow.load().await.unwrap();
        assert!(slot.claimed);
        assert!(matches!(
            flow.claim(&fx.bob.address()).await,
            Err(ClaimError::AlreadyClaimed)
        ));
        assert_eq!(fx.contract.writes(), 0);
    }

    #[tokio::test]
    async fn open_distribution_lets_any_wallet_claim() {
        let fx = fixture(false);
        let mut flow = flow(&fx, 1);
        let slot = flow.load().await.unwrap();
        assert_eq!(slot.expected_address, None);

        let stranger = TestWallet::from_seed(42).address();
        let outcome = flow.claim(&stranger).await.unwrap();
        assert_eq!(outcome.status, ClaimStatus::Claimed);
    }

    #[tokio::test]
    async fn unresolvable_name_fails_load() {
        let fx = fixture(true);
        let resolver = StaticResolver::default();
        let mut flow = ClaimFlow::new(&fx.contract, &resolver, policy(), DIST, 0);
        assert!(matches!(
            flow.load().await,
            Err(ClaimError::Resolution(ResolveError::NotFound { .. }))
        ));
        assert_eq!(flow.stage(), ClaimStage::Error);
    }

    #[tokio::test]
    async fn unknown_distribution_and_bad_index() {
        let fx = fixture(false);
        let mut missing = ClaimFlow::new(&fx.contract, &fx.resolver, policy(), "nope", 0);
        assert!(matches!(
            missing.load().await,
            Err(ClaimError::DistributionNotFound)
        ));

        let mut out_of_range = flow(&fx, 2);
        assert!(matches!(
            out_of_range.load().await,
            Err(ClaimError::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[tokio::test]
    async fn unconfirmed_claim_is_reported_distinctly() {
        let fx = fixture(false);
        fx.contract.set_writes_dropped(true);
        let mut flow = flow(&fx, 0);
        flow.load().await.unwrap();
        let outcome = flow.claim(&fx.alice.address()).await.unwrap();
        assert!(matches!(
            outcome.status,
            ClaimStatus::SubmittedUnverified { .. }
        ));
        assert_eq!(flow.stage(), ClaimStage::SubmittedUnverified);
    }

    #[tokio::test]
    async fn reverted_claim_is_unverified() {
        let fx = fixture(false);
        fx.contract.set_writes_revert(true);
        let mut flow = flow(&fx, 1);
        flow.load().await.unwrap();
        let outcome = flow.claim(&fx.bob.address()).await.unwrap();
        assert_eq!(
            outcome.status,
            ClaimStatus::SubmittedUnverified {
                reason: "transaction reverted".to_string()
            }
        );
        assert_eq!(flow.stage(), ClaimStage::SubmittedUnverified);
    }

    #[tokio::test]
    async fn claimed_slot_loads_as_terminal_without_resolving() {
        let fx = fixture(true);
        fx.contract.mark_claimed(DIST, 0);
        let resolver = StaticResolver::default();
        let mut flow = ClaimFlow::new(&fx.contract, &resolver, policy(), DIST, 0);

        let slot = flow.load().await.unwrap();
        assert!(slot.claimed);
        assert_eq!(slot.expected_address, None);
        assert_eq!(flow.stage(), ClaimStage::Claimed);

        flow.mark_signature_verified();
        assert_eq!(flow.stage(), ClaimStage::Claimed);
        assert!(matches!(
            flow.request_signature(&fx.alice.address()),
            Err(ClaimError::AlreadyClaimed)
        ));
    }

    #[tokio::test]
    async fn claim_before_load_is_refused() {
        let fx = fixture(false);
        let mut flow = flow(&fx, 0);
        assert!(matches!(
            flow.claim(&fx.alice.address()).await,
            Err(ClaimError::NotLoaded)
        ));
    }
}
