use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, TxHash};
use anyhow::Result;
use chrono::Utc;
use moka::future::Cache;

use crate::config::{ApiConfig, SessionConfig};
use crate::contract::{ConfirmationPolicy, DistributionContract};
use crate::flows::create::CreationLimits;
use crate::ownership::lowercase_address;
use crate::resolver::NameResolver;

#[derive(Clone)]
pub struct AppState {
    pub contract: Arc<dyn DistributionContract>,
    pub resolver: Arc<dyn NameResolver>,
    pub sessions: Arc<OwnershipSessions>,
    pub settings: Arc<FlowSettings>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        contract: Arc<dyn DistributionContract>,
        resolver: Arc<dyn NameResolver>,
        sessions: Arc<OwnershipSessions>,
        settings: FlowSettings,
    ) -> Self {
        assert!(
            !settings.public_origin.is_empty(),
            "Public origin must be configured"
        );
        Self {
            contract,
            resolver,
            sessions,
            settings: Arc::new(settings),
            start_time: Instant::now(),
        }
    }
}

/// Knobs the HTTP handlers pass into both flows.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub limits: CreationLimits,
    pub public_origin: String,
    pub confirmation: ConfirmationPolicy,
    pub explorer_tx_url: Option<String>,
}

impl FlowSettings {
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            limits: CreationLimits {
                max_total_wei: config.distribution.max_total_wei()?,
                max_recipients: config.distribution.max_recipients,
            },
            public_origin: config
                .distribution
                .public_origin
                .trim_end_matches('/')
                .to_string(),
            confirmation: ConfirmationPolicy::from(&config.confirmation),
            explorer_tx_url: config.chain.explorer_tx_url.clone(),
        })
    }

    pub fn explorer_link(&self, tx_hash: &TxHash) -> Option<String> {
        self.explorer_tx_url
            .as_ref()
            .map(|base| format!("{}/{tx_hash}", base.trim_end_matches('/')))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedOwnership {
    pub verified_at: i64,
    pub expires_at: i64,
}

/// Wallets that proved ownership for a recipient slot, kept for a short TTL.
pub struct OwnershipSessions {
    entries: Cache<String, VerifiedOwnership>,
    ttl: Duration,
}

impl OwnershipSessions {
    pub fn new(config: &SessionConfig) -> Self {
        assert!(config.max_capacity >= 1, "Session capacity must be positive");
        assert!(config.ttl_seconds >= 1, "Session TTL must be positive");

        let ttl = Duration::from_secs(config.ttl_seconds);
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(ttl)
            .build();
        Self { entries, ttl }
    }

    fn key(distribution_id: &str, index: u64, wallet: &Address) -> String {
        format!("{distribution_id}:{index}:{}", lowercase_address(wallet))
    }

    pub async fn record(
        &self,
        distribution_id: &str,
        index: u64,
        wallet: &Address,
    ) -> VerifiedOwnership {
        let verified_at = Utc::now().timestamp();
        let session = VerifiedOwnership {
            verified_at,
            expires_at: verified_at + self.ttl.as_secs() as i64,
        };
        self.entries
            .insert(Self::key(distribution_id, index, wallet), session)
            .await;
        session
    }

    pub async fn is_verified(&self, distribution_id: &str, index: u64, wallet: &Address) -> bool {
        self.entries
            .get(&Self::key(distribution_id, index, wallet))
            .await
            .is_some()
    }

    pub async fn invalidate(&self, distribution_id: &str, index: u64, wallet: &Address) {
        self.entries
            .invalidate(&Self::key(distribution_id, index, wallet))
            .await;
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}
