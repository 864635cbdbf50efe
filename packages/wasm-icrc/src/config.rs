//! Startup configuration
//!
//! Everything environment-derived (canister ids, identity issuer, agent host,
//! root-key trust) is resolved once into an immutable [`AppConfig`] that is
//! handed to the session manager and the sync engine.

use candid::Principal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::WasmIcrcError;
use crate::token::{TokenDescriptor, TokenId};

/// Source ledger (Bob) canister ids
pub const SOURCE_LEDGER_LOCAL: &str = "bd3sg-teaaa-aaaaa-qaaba-cai";
pub const SOURCE_LEDGER_MAINNET: &str = "7pail-xaaaa-aaaas-aabmq-cai";
/// Destination ledger (reBob) canister ids; it is also the counterparty
/// that holds deposited source tokens and spends allowances
pub const DESTINATION_LEDGER_LOCAL: &str = "bkyz2-fmaaa-aaaaa-qaaaq-cai";
pub const DESTINATION_LEDGER_MAINNET: &str = "qvwlv-uyaaa-aaaas-aidpq-cai";

pub const LOCAL_IDENTITY_ISSUER: &str = "http://br5f7-7uaaa-aaaaa-qaaca-cai.localhost:4943";
pub const IC0_APP_IDENTITY_ISSUER: &str = "https://identity.ic0.app/";
pub const INTERNET_COMPUTER_ORG_IDENTITY_ISSUER: &str = "https://identity.internetcomputer.org/";

pub const LOCAL_AGENT_HOST: &str = "http://localhost:4943";
pub const MAINNET_AGENT_HOST: &str = "https://ic0.app/";

pub const SOURCE_FEE: u128 = 1_000_000;
pub const SOURCE_DECIMALS: u8 = 8;
pub const DESTINATION_FEE: u128 = 10_000;
pub const DESTINATION_DECIMALS: u8 = 6;

/// Host markers that identify a page served by a local replica
const LOOPBACK_MARKERS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Whether the page origin points at a local replica
///
/// The only place loopback detection happens; issuer, agent host and
/// root-key trust all derive from its result.
pub fn is_loopback_origin(origin: &str) -> bool {
    LOOPBACK_MARKERS.iter().any(|marker| origin.contains(marker))
}

/// Which deployment the canister ids come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum NetworkMode {
    Local,
    #[default]
    Production,
}

impl FromStr for NetworkMode {
    type Err = WasmIcrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(NetworkMode::Local),
            "ic" | "production" | "mainnet" => Ok(NetworkMode::Production),
            other => Err(WasmIcrcError::Config(format!("Unknown network: {}", other))),
        }
    }
}

impl TryFrom<String> for NetworkMode {
    type Error = WasmIcrcError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Production identity issuer picked by the operator before the redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssuerChoice {
    Ic0App,
    InternetComputerOrg,
}

impl IssuerChoice {
    pub fn from_index(index: u32) -> Option<IssuerChoice> {
        match index {
            0 => Some(IssuerChoice::Ic0App),
            1 => Some(IssuerChoice::InternetComputerOrg),
            _ => None,
        }
    }
}

/// Optional settings supplied by the front-end at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    #[serde(default)]
    pub network: NetworkMode,
    /// `window.location.href` or origin of the hosting page
    #[serde(default)]
    pub page_origin: String,
    #[serde(default)]
    pub source_canister: Option<String>,
    #[serde(default)]
    pub destination_canister: Option<String>,
    /// Ledger queried anonymously for the counterparty's holdings
    #[serde(default)]
    pub aggregate_ledger: Option<String>,
    #[serde(default)]
    pub aggregate_holder: Option<String>,
}

/// Where the anonymous "total held by the counterparty" query goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTarget {
    pub ledger: Principal,
    pub holder: Principal,
    pub decimals: u8,
}

/// Immutable application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    network: NetworkMode,
    local_replica: bool,
    source: TokenDescriptor,
    destination: TokenDescriptor,
    aggregate: AggregateTarget,
}

impl AppConfig {
    /// Resolve the default token table for `network`, with host detection from `page_origin`
    pub fn resolve(network: NetworkMode, page_origin: &str) -> Result<AppConfig, WasmIcrcError> {
        AppConfig::from_overrides(ConfigOverrides {
            network,
            page_origin: page_origin.to_string(),
            ..Default::default()
        })
    }

    pub fn from_overrides(overrides: ConfigOverrides) -> Result<AppConfig, WasmIcrcError> {
        let (source_default, destination_default) = match overrides.network {
            NetworkMode::Local => (SOURCE_LEDGER_LOCAL, DESTINATION_LEDGER_LOCAL),
            NetworkMode::Production => (SOURCE_LEDGER_MAINNET, DESTINATION_LEDGER_MAINNET),
        };

        let source_canister =
            canister_id(overrides.source_canister.as_deref().unwrap_or(source_default))?;
        let destination_canister = canister_id(
            overrides
                .destination_canister
                .as_deref()
                .unwrap_or(destination_default),
        )?;

        // The holdings query reads mainnet even when the app runs locally
        let aggregate = AggregateTarget {
            ledger: canister_id(
                overrides
                    .aggregate_ledger
                    .as_deref()
                    .unwrap_or(SOURCE_LEDGER_MAINNET),
            )?,
            holder: canister_id(
                overrides
                    .aggregate_holder
                    .as_deref()
                    .unwrap_or(DESTINATION_LEDGER_MAINNET),
            )?,
            decimals: SOURCE_DECIMALS,
        };

        Ok(AppConfig {
            network: overrides.network,
            local_replica: is_loopback_origin(&overrides.page_origin),
            source: TokenDescriptor {
                id: TokenId::Source,
                ticker: "Bob".to_string(),
                decimals: SOURCE_DECIMALS,
                fee: SOURCE_FEE,
                canister: source_canister,
            },
            destination: TokenDescriptor {
                id: TokenId::Destination,
                ticker: "reBob".to_string(),
                decimals: DESTINATION_DECIMALS,
                fee: DESTINATION_FEE,
                canister: destination_canister,
            },
            aggregate,
        })
    }

    pub fn network(&self) -> NetworkMode {
        self.network
    }

    /// True when the page is served by a local replica
    pub fn is_local_replica(&self) -> bool {
        self.local_replica
    }

    pub fn token(&self, id: TokenId) -> &TokenDescriptor {
        match id {
            TokenId::Source => &self.source,
            TokenId::Destination => &self.destination,
        }
    }

    pub fn tokens(&self) -> [&TokenDescriptor; 2] {
        [&self.source, &self.destination]
    }

    /// Canister that holds deposits and is granted allowances
    pub fn counterparty(&self) -> Principal {
        self.destination.canister
    }

    /// Canisters the extension signer is asked to whitelist
    pub fn whitelist(&self) -> Vec<Principal> {
        vec![self.source.canister, self.destination.canister]
    }

    pub fn aggregate(&self) -> &AggregateTarget {
        &self.aggregate
    }

    /// Identity issuer for the delegated login; local replicas ignore `choice`
    pub fn identity_issuer(&self, choice: IssuerChoice) -> &'static str {
        if self.local_replica {
            return LOCAL_IDENTITY_ISSUER;
        }
        match choice {
            IssuerChoice::Ic0App => IC0_APP_IDENTITY_ISSUER,
            IssuerChoice::InternetComputerOrg => INTERNET_COMPUTER_ORG_IDENTITY_ISSUER,
        }
    }

    /// Host for outbound agent calls
    pub fn agent_host(&self) -> &'static str {
        if self.local_replica {
            LOCAL_AGENT_HOST
        } else {
            MAINNET_AGENT_HOST
        }
    }

    /// Local replicas have an untrusted root key that must be fetched
    pub fn fetch_root_key(&self) -> bool {
        self.local_replica
    }
}

fn canister_id(text: &str) -> Result<Principal, WasmIcrcError> {
    Principal::from_text(text)
        .map_err(|e| WasmIcrcError::Config(format!("Invalid canister id '{}': {}", text, e)))
}
