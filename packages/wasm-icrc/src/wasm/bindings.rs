//! Ledger and wallet-provider adapters over JavaScript SDK objects
//!
//! The page hands in duck-typed objects wrapping the real SDKs. Each is
//! bound as a structural extern type and adapted to the matching core trait.

use async_trait::async_trait;
use candid::{Nat, Principal};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::WasmIcrcError;
use crate::ledger::{nat_to_u128, Account, Allowance, AllowanceArgs, LedgerActor, TransferArg, TransferResult};
use crate::provider::{Agent, AgentOptions, AuthClient, AuthClientFactory, ConnectRequest, ExtensionSigner};
use crate::wasm::try_from_js_value::TryFromJsValue;
use crate::wasm::try_into_js_value::JsConversionError;

#[wasm_bindgen(typescript_custom_section)]
const PROVIDER_TYPES: &'static str = r#"
export interface IcrcLedger {
  balanceOf(owner: string): Promise<bigint>;
  allowance(owner: string, spender: string): Promise<{ allowance: bigint; expires_at?: bigint }>;
  transfer(args: {
    to: string;
    amount: bigint;
    fee?: bigint;
    createdAtTime?: bigint;
  }): Promise<{ Ok: bigint } | { Err: Record<string, unknown> }>;
}

export interface IcrcAgent {
  principal(): string;
  ledger(canisterId: string): Promise<IcrcLedger>;
}

export interface ExtensionSigner {
  requestConnect(request: { whitelist: string[]; host: string }): Promise<IcrcAgent>;
  disconnect(): Promise<void>;
}

export interface DelegatedAuthClient {
  login(identityProvider: string): Promise<void>;
  createAgent(options: { host: string; fetchRootKey: boolean }): Promise<IcrcAgent>;
  logout(): Promise<void>;
}

export interface AuthClientFactory {
  create(): Promise<DelegatedAuthClient>;
}
"#;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "IcrcLedger")]
    pub type JsLedger;

    #[wasm_bindgen(method, structural, catch, js_name = "balanceOf")]
    fn balance_of(this: &JsLedger, owner: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, structural, catch)]
    fn allowance(this: &JsLedger, owner: &str, spender: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, structural, catch)]
    fn transfer(this: &JsLedger, args: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "IcrcAgent")]
    pub type JsAgent;

    #[wasm_bindgen(method, structural, catch)]
    fn principal(this: &JsAgent) -> Result<String, JsValue>;

    #[wasm_bindgen(method, structural, catch)]
    fn ledger(this: &JsAgent, canister_id: &str) -> Result<js_sys::Promise, JsValue>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "ExtensionSigner")]
    pub type JsExtensionSigner;

    #[wasm_bindgen(method, structural, catch, js_name = "requestConnect")]
    fn request_connect(this: &JsExtensionSigner, request: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, structural, catch)]
    fn disconnect(this: &JsExtensionSigner) -> Result<js_sys::Promise, JsValue>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "DelegatedAuthClient")]
    pub type JsAuthClient;

    #[wasm_bindgen(method, structural, catch)]
    fn login(this: &JsAuthClient, identity_provider: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, structural, catch, js_name = "createAgent")]
    fn create_agent(this: &JsAuthClient, options: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, structural, catch)]
    fn logout(this: &JsAuthClient) -> Result<js_sys::Promise, JsValue>;
}

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "AuthClientFactory")]
    pub type JsAuthClientFactory;

    #[wasm_bindgen(method, structural, catch)]
    fn create(this: &JsAuthClientFactory) -> Result<js_sys::Promise, JsValue>;
}

/// Best-effort message out of a thrown JS value
fn js_message(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// Await a promise-returning JS call
async fn settle(call: Result<js_sys::Promise, JsValue>) -> Result<JsValue, JsValue> {
    JsFuture::from(call?).await
}

fn network(err: JsValue) -> WasmIcrcError {
    WasmIcrcError::NetworkFailure(js_message(&err))
}

fn login_failure(err: JsValue) -> WasmIcrcError {
    WasmIcrcError::LoginFailure(js_message(&err))
}

fn conversion(err: JsConversionError) -> WasmIcrcError {
    WasmIcrcError::InvalidInput(err.to_string())
}

fn transfer_object(
    arg: &TransferArg,
    amount: u128,
    fee: Option<u128>,
) -> Result<JsValue, JsConversionError> {
    crate::js_obj!(
        "to" => arg.to.owner.to_text(),
        "amount" => amount,
        "fee" => fee,
        "createdAtTime" => arg.created_at_time,
    )
}

fn connect_object(request: &ConnectRequest) -> Result<JsValue, JsConversionError> {
    let whitelist: Vec<String> = request.whitelist.iter().map(|p| p.to_text()).collect();
    crate::js_obj!(
        "whitelist" => whitelist,
        "host" => request.host,
    )
}

fn agent_options_object(options: &AgentOptions) -> Result<JsValue, JsConversionError> {
    crate::js_obj!(
        "host" => options.host,
        "fetchRootKey" => options.fetch_root_key,
    )
}

/// Ledger actor backed by a JS ledger object
pub struct JsLedgerActor {
    canister: Principal,
    inner: JsLedger,
}

impl JsLedgerActor {
    pub fn new(canister: Principal, inner: JsLedger) -> JsLedgerActor {
        JsLedgerActor { canister, inner }
    }

    fn transfer_args(arg: &TransferArg) -> Result<JsValue, WasmIcrcError> {
        let amount = nat_to_u128(&arg.amount)?;
        let fee = arg.fee.as_ref().map(nat_to_u128).transpose()?;
        transfer_object(arg, amount, fee).map_err(conversion)
    }
}

#[async_trait(?Send)]
impl LedgerActor for JsLedgerActor {
    fn canister(&self) -> Principal {
        self.canister
    }

    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, WasmIcrcError> {
        let owner = account.owner.to_text();
        let reply = settle(self.inner.balance_of(&owner)).await.map_err(network)?;
        Nat::try_from_js_value(&reply)
    }

    async fn icrc1_transfer(&self, arg: TransferArg) -> Result<TransferResult, WasmIcrcError> {
        let args = JsLedgerActor::transfer_args(&arg)?;
        let reply = settle(self.inner.transfer(&args)).await.map_err(network)?;
        TransferResult::try_from_js_value(&reply)
    }

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, WasmIcrcError> {
        let owner = args.account.owner.to_text();
        let spender = args.spender.owner.to_text();
        let reply = settle(self.inner.allowance(&owner, &spender))
            .await
            .map_err(network)?;
        Allowance::try_from_js_value(&reply)
    }
}

/// Agent backed by a JS agent object
pub struct JsAgentAdapter {
    inner: JsAgent,
}

impl JsAgentAdapter {
    pub fn new(inner: JsValue) -> JsAgentAdapter {
        JsAgentAdapter {
            inner: inner.unchecked_into(),
        }
    }
}

#[async_trait(?Send)]
impl Agent for JsAgentAdapter {
    fn principal(&self) -> Result<Principal, WasmIcrcError> {
        let text = self.inner.principal().map_err(login_failure)?;
        Principal::from_text(&text)
            .map_err(|e| WasmIcrcError::LoginFailure(format!("Agent principal '{}': {}", text, e)))
    }

    async fn ledger_actor(&self, canister: Principal) -> Result<Rc<dyn LedgerActor>, WasmIcrcError> {
        let ledger = settle(self.inner.ledger(&canister.to_text()))
            .await
            .map_err(network)?;
        Ok(Rc::new(JsLedgerActor::new(canister, ledger.unchecked_into())))
    }
}

pub struct JsExtensionAdapter {
    inner: JsExtensionSigner,
}

impl JsExtensionAdapter {
    /// `None` when no provider object is injected in the page
    pub fn from_value(value: JsValue) -> Option<JsExtensionAdapter> {
        if value.is_undefined() || value.is_null() {
            None
        } else {
            Some(JsExtensionAdapter {
                inner: value.unchecked_into(),
            })
        }
    }
}

#[async_trait(?Send)]
impl ExtensionSigner for JsExtensionAdapter {
    async fn request_connect(&self, request: &ConnectRequest) -> Result<Rc<dyn Agent>, WasmIcrcError> {
        let request = connect_object(request).map_err(conversion)?;
        let agent = settle(self.inner.request_connect(&request))
            .await
            .map_err(login_failure)?;
        Ok(Rc::new(JsAgentAdapter::new(agent)))
    }

    async fn disconnect(&self) -> Result<(), WasmIcrcError> {
        settle(self.inner.disconnect()).await.map_err(network)?;
        Ok(())
    }
}

pub struct JsAuthClientAdapter {
    inner: JsAuthClient,
}

#[async_trait(?Send)]
impl AuthClient for JsAuthClientAdapter {
    async fn login(&self, identity_issuer: &str) -> Result<(), WasmIcrcError> {
        settle(self.inner.login(identity_issuer))
            .await
            .map_err(login_failure)?;
        Ok(())
    }

    async fn create_agent(&self, options: &AgentOptions) -> Result<Rc<dyn Agent>, WasmIcrcError> {
        let options = agent_options_object(options).map_err(conversion)?;
        let agent = settle(self.inner.create_agent(&options))
            .await
            .map_err(login_failure)?;
        Ok(Rc::new(JsAgentAdapter::new(agent)))
    }

    async fn logout(&self) -> Result<(), WasmIcrcError> {
        settle(self.inner.logout()).await.map_err(network)?;
        Ok(())
    }
}

pub struct JsAuthFactoryAdapter {
    inner: JsAuthClientFactory,
}

impl JsAuthFactoryAdapter {
    pub fn new(inner: JsValue) -> JsAuthFactoryAdapter {
        JsAuthFactoryAdapter {
            inner: inner.unchecked_into(),
        }
    }
}

#[async_trait(?Send)]
impl AuthClientFactory for JsAuthFactoryAdapter {
    async fn create(&self) -> Result<Rc<dyn AuthClient>, WasmIcrcError> {
        let client = settle(self.inner.create()).await.map_err(login_failure)?;
        Ok(Rc::new(JsAuthClientAdapter {
            inner: client.unchecked_into(),
        }))
    }
}
