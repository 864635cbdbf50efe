//! Identity and agent providers
//!
//! The wallet SDKs (browser-extension signer, delegated-identity auth client,
//! outbound-call agents) are consumed through these traits. The WASM layer
//! implements them over JavaScript objects; tests implement them in memory.

use async_trait::async_trait;
use candid::Principal;
use std::rc::Rc;

use crate::error::WasmIcrcError;
use crate::ledger::LedgerActor;

/// Outbound-call agent signing with one identity
#[async_trait(?Send)]
pub trait Agent {
    /// Principal of the signing identity
    fn principal(&self) -> Result<Principal, WasmIcrcError>;

    /// Build a ledger actor for `canister` under this agent
    async fn ledger_actor(&self, canister: Principal) -> Result<Rc<dyn LedgerActor>, WasmIcrcError>;
}

/// What the extension signer is asked to grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub whitelist: Vec<Principal>,
    pub host: String,
}

/// Injected browser-extension signer
#[async_trait(?Send)]
pub trait ExtensionSigner {
    /// Ask the user to connect; resolves with the provider-issued agent
    async fn request_connect(&self, request: &ConnectRequest) -> Result<Rc<dyn Agent>, WasmIcrcError>;

    async fn disconnect(&self) -> Result<(), WasmIcrcError>;
}

/// Options for the agent built from a delegated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOptions {
    pub host: String,
    /// Trust the replica's root key (local networks only)
    pub fetch_root_key: bool,
}

/// Local auth client driving the delegated-identity consent flow
#[async_trait(?Send)]
pub trait AuthClient {
    /// Open the issuer and wait for the consent callback
    async fn login(&self, identity_issuer: &str) -> Result<(), WasmIcrcError>;

    /// Agent signing with the delegated identity obtained by `login`
    async fn create_agent(&self, options: &AgentOptions) -> Result<Rc<dyn Agent>, WasmIcrcError>;

    async fn logout(&self) -> Result<(), WasmIcrcError>;
}

/// Builds a fresh [`AuthClient`] for every delegated login
#[async_trait(?Send)]
pub trait AuthClientFactory {
    async fn create(&self) -> Result<Rc<dyn AuthClient>, WasmIcrcError>;
}
