//! In-memory ledgers and providers for unit tests

use async_trait::async_trait;
use candid::{Nat, Principal};
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::{AppConfig, NetworkMode};
use crate::error::WasmIcrcError;
use crate::ledger::{
    Account, Allowance, AllowanceArgs, LedgerActor, TransferArg, TransferError, TransferResult,
};
use crate::provider::{
    Agent, AgentOptions, AuthClient, AuthClientFactory, ConnectRequest, ExtensionSigner,
};

pub const USER: &str = "2vxsx-fae";

pub fn user() -> Principal {
    Principal::from_text(USER).unwrap()
}

pub fn mainnet_config() -> AppConfig {
    AppConfig::resolve(NetworkMode::Production, "https://rehash.example/").unwrap()
}

/// Ledger with scripted balances and allowances
pub struct FakeLedger {
    canister: Principal,
    balances: RefCell<HashMap<Principal, u128>>,
    allowances: RefCell<HashMap<(Principal, Principal), u128>>,
    failing: Cell<bool>,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
    transfer_gate: RefCell<Option<oneshot::Receiver<()>>>,
    transfer_error: RefCell<Option<TransferError>>,
    pub transfers: RefCell<Vec<TransferArg>>,
    pub balance_queries: Cell<u32>,
}

impl FakeLedger {
    pub fn new(canister: Principal) -> Rc<FakeLedger> {
        Rc::new(FakeLedger {
            canister,
            balances: RefCell::new(HashMap::new()),
            allowances: RefCell::new(HashMap::new()),
            failing: Cell::new(false),
            gate: RefCell::new(None),
            transfer_gate: RefCell::new(None),
            transfer_error: RefCell::new(None),
            transfers: RefCell::new(Vec::new()),
            balance_queries: Cell::new(0),
        })
    }

    pub fn set_balance(&self, owner: Principal, amount: u128) {
        self.balances.borrow_mut().insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Principal, spender: Principal, amount: u128) {
        self.allowances.borrow_mut().insert((owner, spender), amount);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    pub fn reject_transfers_with(&self, err: TransferError) {
        *self.transfer_error.borrow_mut() = Some(err);
    }

    /// Hold the next balance query until the returned sender fires
    pub fn hold_next_query(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.borrow_mut() = Some(rx);
        tx
    }

    /// Hold the next transfer until the returned sender fires
    pub fn hold_next_transfer(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.transfer_gate.borrow_mut() = Some(rx);
        tx
    }

    fn check(&self) -> Result<(), WasmIcrcError> {
        if self.failing.get() {
            Err(WasmIcrcError::network("replica unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl LedgerActor for FakeLedger {
    fn canister(&self) -> Principal {
        self.canister
    }

    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, WasmIcrcError> {
        self.balance_queries.set(self.balance_queries.get() + 1);
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check()?;
        let balance = self.balances.borrow().get(&account.owner).copied().unwrap_or(0);
        Ok(Nat::from(balance))
    }

    async fn icrc1_transfer(&self, arg: TransferArg) -> Result<TransferResult, WasmIcrcError> {
        let gate = self.transfer_gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.check()?;
        self.transfers.borrow_mut().push(arg);
        match self.transfer_error.borrow().clone() {
            Some(err) => Ok(Err(err)),
            None => Ok(Ok(Nat::from(self.transfers.borrow().len() as u64))),
        }
    }

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, WasmIcrcError> {
        self.check()?;
        let allowance = self
            .allowances
            .borrow()
            .get(&(args.account.owner, args.spender.owner))
            .copied()
            .unwrap_or(0);
        Ok(Allowance {
            allowance: Nat::from(allowance),
            expires_at: None,
        })
    }
}

/// Agent handing out the fake ledgers it was built with
pub struct FakeAgent {
    principal: Principal,
    ledgers: Vec<Rc<FakeLedger>>,
    pub actors_built: Cell<u32>,
}

impl FakeAgent {
    pub fn new(principal: Principal, ledgers: Vec<Rc<FakeLedger>>) -> Rc<FakeAgent> {
        Rc::new(FakeAgent {
            principal,
            ledgers,
            actors_built: Cell::new(0),
        })
    }

    /// Agent over fresh ledgers for both configured tokens
    pub fn for_config(config: &AppConfig) -> Rc<FakeAgent> {
        let ledgers = config
            .tokens()
            .iter()
            .map(|token| FakeLedger::new(token.canister))
            .collect();
        FakeAgent::new(user(), ledgers)
    }

    pub fn ledger(&self, canister: Principal) -> Rc<FakeLedger> {
        self.ledgers
            .iter()
            .find(|ledger| ledger.canister == canister)
            .cloned()
            .unwrap()
    }
}

#[async_trait(?Send)]
impl Agent for FakeAgent {
    fn principal(&self) -> Result<Principal, WasmIcrcError> {
        Ok(self.principal)
    }

    async fn ledger_actor(&self, canister: Principal) -> Result<Rc<dyn LedgerActor>, WasmIcrcError> {
        let ledger = self
            .ledgers
            .iter()
            .find(|ledger| ledger.canister == canister)
            .cloned()
            .ok_or_else(|| WasmIcrcError::network(format!("no ledger {}", canister)))?;
        self.actors_built.set(self.actors_built.get() + 1);
        Ok(ledger)
    }
}

pub struct FakeExtension {
    agent: Rc<FakeAgent>,
    deny: bool,
    pub requests: RefCell<Vec<ConnectRequest>>,
    pub disconnects: Cell<u32>,
}

impl FakeExtension {
    pub fn granting(agent: Rc<FakeAgent>) -> Rc<FakeExtension> {
        Rc::new(FakeExtension {
            agent,
            deny: false,
            requests: RefCell::new(Vec::new()),
            disconnects: Cell::new(0),
        })
    }

    pub fn denying(agent: Rc<FakeAgent>) -> Rc<FakeExtension> {
        Rc::new(FakeExtension {
            agent,
            deny: true,
            requests: RefCell::new(Vec::new()),
            disconnects: Cell::new(0),
        })
    }
}

#[async_trait(?Send)]
impl ExtensionSigner for FakeExtension {
    async fn request_connect(&self, request: &ConnectRequest) -> Result<Rc<dyn Agent>, WasmIcrcError> {
        self.requests.borrow_mut().push(request.clone());
        if self.deny {
            return Err(WasmIcrcError::LoginFailure("user rejected".to_string()));
        }
        Ok(self.agent.clone())
    }

    async fn disconnect(&self) -> Result<(), WasmIcrcError> {
        self.disconnects.set(self.disconnects.get() + 1);
        Ok(())
    }
}

pub struct FakeAuthClient {
    agent: Rc<FakeAgent>,
    consent: bool,
    pub issuer: RefCell<Option<String>>,
    pub agent_options: RefCell<Option<AgentOptions>>,
    pub logouts: Cell<u32>,
}

#[async_trait(?Send)]
impl AuthClient for FakeAuthClient {
    async fn login(&self, identity_issuer: &str) -> Result<(), WasmIcrcError> {
        *self.issuer.borrow_mut() = Some(identity_issuer.to_string());
        if self.consent {
            Ok(())
        } else {
            Err(WasmIcrcError::LoginFailure("UserInterrupt".to_string()))
        }
    }

    async fn create_agent(&self, options: &AgentOptions) -> Result<Rc<dyn Agent>, WasmIcrcError> {
        *self.agent_options.borrow_mut() = Some(options.clone());
        Ok(self.agent.clone())
    }

    async fn logout(&self) -> Result<(), WasmIcrcError> {
        self.logouts.set(self.logouts.get() + 1);
        Ok(())
    }
}

/// Factory recording every client it creates
pub struct FakeAuthFactory {
    agent: Rc<FakeAgent>,
    consent: bool,
    pub clients: RefCell<Vec<Rc<FakeAuthClient>>>,
}

impl FakeAuthFactory {
    pub fn new(agent: Rc<FakeAgent>, consent: bool) -> Rc<FakeAuthFactory> {
        Rc::new(FakeAuthFactory {
            agent,
            consent,
            clients: RefCell::new(Vec::new()),
        })
    }
}

#[async_trait(?Send)]
impl AuthClientFactory for FakeAuthFactory {
    async fn create(&self) -> Result<Rc<dyn AuthClient>, WasmIcrcError> {
        let client = Rc::new(FakeAuthClient {
            agent: self.agent.clone(),
            consent: self.consent,
            issuer: RefCell::new(None),
            agent_options: RefCell::new(None),
            logouts: Cell::new(0),
        });
        self.clients.borrow_mut().push(client.clone());
        Ok(client)
    }
}
