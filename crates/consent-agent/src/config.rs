//! Agent configuration
//!
//! Loaded from TOML at startup; every field has a default so a file only
//! needs to name the contract address.

use consent_core::timers::{ABANDON_TIMEOUT_MS, EXPIRY_REMINDER_LEAD_MS};
use consent_core::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// BNB Smart Chain testnet.
pub const DEFAULT_CHAIN_ID: u64 = 97;

/// Delay between a completed navigation and the consent scan it triggers.
pub const DEFAULT_SCAN_DELAY_MS: u64 = 3_000;

/// Where the issuance flow sends the user when no return URL was given.
pub const CONSENTS_PAGE: &str = "/my-consents";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentAgentConfig {
    /// Address of the deployed consent contract.
    pub contract_address: String,
    pub expected_chain_id: u64,
    /// Origin of the consent app itself, never scanned.
    pub app_origin: String,
    pub abandon_timeout_ms: u64,
    pub expiry_reminder_lead_ms: u64,
    pub scan_delay_ms: u64,
    /// URL prefixes excluded from automatic scanning.
    pub skip_url_prefixes: Vec<String>,
    /// Default `tracing` directive when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Page shown after issuance when the request had no return URL.
    pub consents_page: String,
}

impl Default for ConsentAgentConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            expected_chain_id: DEFAULT_CHAIN_ID,
            app_origin: "localhost:5173".to_string(),
            abandon_timeout_ms: ABANDON_TIMEOUT_MS,
            expiry_reminder_lead_ms: EXPIRY_REMINDER_LEAD_MS,
            scan_delay_ms: DEFAULT_SCAN_DELAY_MS,
            skip_url_prefixes: ["chrome://", "chrome-extension://", "moz-extension://", "about:"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            log_filter: "info".to_string(),
            consents_page: CONSENTS_PAGE.to_string(),
        }
    }
}

impl ConsentAgentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parsed contract address.
    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        Address::parse(&self.contract_address).map_err(|e| {
            ConfigError::Invalid(vec![format!("contract_address {:?}: {e}", self.contract_address)])
        })
    }

    /// Check every field, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.contract_address.trim().is_empty() {
            problems.push("contract_address is not set".to_string());
        } else if let Err(e) = Address::parse(&self.contract_address) {
            problems.push(format!("contract_address {:?}: {e}", self.contract_address));
        }
        for (name, value) in [
            ("abandon_timeout_ms", self.abandon_timeout_ms),
            ("expiry_reminder_lead_ms", self.expiry_reminder_lead_ms),
        ] {
            if value == 0 {
                problems.push(format!("{name} must be greater than zero"));
            }
        }
        if self.skip_url_prefixes.iter().any(|p| p.trim().is_empty()) {
            problems.push("skip_url_prefixes contains an empty entry".to_string());
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.log_filter) {
            problems.push(format!("log_filter {:?}: {e}", self.log_filter));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}
