use std::{collections::HashMap, fs, path::Path, time::Duration};

use ledger_gateway::{ContractTarget, DEFAULT_CONTRACT_ADDRESS};
use shared::domain::Address;
use url::Url;

use crate::error::ClientError;

const SETTINGS_FILE: &str = "governance.toml";
const ACCEPTED_SCHEMES: [&str; 4] = ["http", "https", "ws", "wss"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub rpc_url: String,
    pub contract_address: Address,
    /// Unbounded when `None`; a stuck confirmation then keeps its busy flag set.
    pub confirmation_timeout: Option<Duration>,
    pub event_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            contract_address: Address::new(DEFAULT_CONTRACT_ADDRESS),
            confirmation_timeout: None,
            event_capacity: 256,
        }
    }
}

impl ClientSettings {
    pub fn contract_target(&self) -> Result<ContractTarget, ClientError> {
        let rpc_url = parse_rpc_url(&self.rpc_url)?;
        Ok(ContractTarget {
            rpc_url,
            address: self.contract_address.clone(),
        })
    }
}

pub fn load_settings() -> ClientSettings {
    let mut settings = load_settings_file(Path::new(SETTINGS_FILE));
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Reads a flat string table; a missing or malformed file yields defaults.
pub fn load_settings_file(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("rpc_url") {
                settings.rpc_url = v.clone();
            }
            if let Some(v) = file_cfg.get("contract_address") {
                settings.contract_address = Address::new(v.as_str());
            }
            if let Some(v) = file_cfg.get("confirmation_timeout_secs") {
                if let Ok(secs) = v.parse::<u64>() {
                    settings.confirmation_timeout = Some(Duration::from_secs(secs));
                }
            }
        }
    }

    settings
}

pub fn apply_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GOVERNANCE_RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = lookup("APP__RPC_URL") {
        settings.rpc_url = v;
    }

    if let Some(v) = lookup("GOVERNANCE_CONTRACT_ADDRESS") {
        settings.contract_address = Address::new(v);
    }
    if let Some(v) = lookup("APP__CONTRACT_ADDRESS") {
        settings.contract_address = Address::new(v);
    }

    if let Some(v) = lookup("APP__CONFIRMATION_TIMEOUT_SECS") {
        if let Ok(secs) = v.parse::<u64>() {
            settings.confirmation_timeout = Some(Duration::from_secs(secs));
        }
    }
}

fn parse_rpc_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ClientError::ContractSetup(format!("invalid rpc url '{raw}': {err}")))?;
    if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
        return Err(ClientError::ContractSetup(format!(
            "unsupported rpc url scheme '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}
