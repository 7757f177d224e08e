use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result, anyhow, ensure};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::amount::parse_ether;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    pub resolver: ResolverConfig,
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("SHAGUN_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("SHAGUN_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self> {
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.server.ensure_bounds()?;
        assert!(!self.chain.rpc_url.is_empty(), "RPC URL must be specified");
        self.chain.contract_address()?;
        self.confirmation.ensure_bounds()?;
        self.resolver.ensure_bounds()?;
        self.distribution.ensure_bounds()?;
        self.sessions.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        SocketAddr::new(host, self.port)
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure!(self.port != 0, "HTTP port cannot be zero");
        ensure!(self.port < 65535, "HTTP port must be below 65535");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub request_timeout_ms: Option<u64>,
    pub contract_address: String,
    /// Prefix the transaction hash is appended to for explorer links.
    pub explorer_tx_url: Option<String>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(10_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn contract_address(&self) -> Result<Address> {
        let address = Address::from_str(self.contract_address.trim())
            .map_err(|err| anyhow!("Invalid contract address {}: {err}", self.contract_address))?;
        ensure!(address != Address::ZERO, "Contract address must not be zero");
        Ok(address)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_ms: 60_000,
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.poll_interval_ms >= 100,
            "Receipt poll interval must be >= 100ms"
        );
        assert!(
            self.timeout_ms >= self.poll_interval_ms,
            "Confirmation timeout must cover at least one poll"
        );
        assert!(
            self.timeout_ms <= 600_000,
            "Confirmation timeout cannot exceed ten minutes"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    pub lookup_url: String,
    pub request_timeout_ms: Option<u64>,
    pub user_agent: String,
}

impl ResolverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(10_000))
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.lookup_url.starts_with("http://") || self.lookup_url.starts_with("https://"),
            "Resolver lookup URL must be http(s)"
        );
        assert!(!self.user_agent.is_empty(), "Resolver user agent required");
        let millis = self.request_timeout_ms.unwrap_or(10_000);
        assert!(millis >= 100, "Resolver timeout must be at least 100ms");
        assert!(millis <= 60_000, "Resolver timeout cannot exceed 60 seconds");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub public_origin: String,
    #[serde(default = "DistributionConfig::default_max_total_amount")]
    pub max_total_amount: String,
    #[serde(default = "DistributionConfig::default_max_recipients")]
    pub max_recipients: u32,
}

impl DistributionConfig {
    pub fn max_total_wei(&self) -> Result<U256> {
        parse_ether(&self.max_total_amount)
            .map_err(|err| anyhow!("Invalid max_total_amount {}: {err}", self.max_total_amount))
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            !self.public_origin.is_empty(),
            "Public origin for claim links must be set"
        );
        assert!(self.max_recipients >= 1, "At least one recipient required");
        assert!(
            self.max_recipients <= 1_000,
            "Recipient ceiling exceeds hard limit"
        );
        let ceiling = self.max_total_wei()?;
        assert!(!ceiling.is_zero(), "Amount ceiling must be positive");
        Ok(())
    }

    fn default_max_total_amount() -> String {
        "100".to_string()
    }

    const fn default_max_recipients() -> u32 {
        50
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub max_capacity: u64,
    pub ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl_seconds: 600,
        }
    }
}

impl SessionConfig {
    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.max_capacity >= 100,
            "Session cache capacity must be at least 100"
        );
        ensure!(self.ttl_seconds >= 1, "Session TTL must be at least one second");
        ensure!(
            self.ttl_seconds <= 86_400,
            "Session TTL cannot exceed one day"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
