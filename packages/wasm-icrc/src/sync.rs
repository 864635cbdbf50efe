//! Balance and allowance synchronisation
//!
//! [`BalanceSyncEngine`] owns one [`BalanceSnapshot`] per token and refreshes
//! them from the session's ledger actors. Refreshes are driven by discrete
//! [`SyncTrigger`] events, never by a timer.
//!
//! Every pass is tagged with the session generation it ran against and a
//! monotonic issue tick. A result is only written if nothing newer has been
//! written or observed for that token, so a slow pass for an old actor set
//! cannot clobber a later one.

use candid::Principal;
use futures::future::join_all;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::{AggregateTarget, AppConfig};
use crate::error::WasmIcrcError;
use crate::ledger::{nat_to_u128, Account, AllowanceArgs, LedgerActor};
use crate::session::Session;
use crate::token::{TokenDescriptor, TokenId};

/// Last known balance and allowance of the session principal for one token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub token: TokenId,
    pub balance: u128,
    /// Allowance granted to the counterparty canister
    pub allowance: u128,
    /// Tick at which the producing pass was issued
    pub fetched_at: u64,
    /// Session generation the producing pass ran against
    pub generation: u64,
}

impl BalanceSnapshot {
    /// Produced for a different actor set than `session`'s
    pub fn is_stale(&self, session: &Session) -> bool {
        self.generation != session.generation()
    }
}

/// Amount of the aggregate ledger's token held by the counterparty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub amount: u128,
    pub fetched_at: u64,
}

/// Events that may require a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The session's actor set changed (login)
    ActorsChanged,
    /// A transfer reached the ledger
    TransferCompleted,
    /// The session was reset to anonymous
    SessionCleared,
}

type TokenResult = (TokenId, Result<(u128, u128), WasmIcrcError>);

pub struct BalanceSyncEngine {
    counterparty: Principal,
    aggregate_target: AggregateTarget,
    anonymous: Rc<dyn LedgerActor>,
    snapshots: RefCell<BTreeMap<TokenId, BalanceSnapshot>>,
    aggregate: RefCell<Option<AggregateSnapshot>>,
    /// Failed tokens with the tick of the failing pass
    failures: RefCell<BTreeMap<TokenId, (u64, WasmIcrcError)>>,
    aggregate_failure: RefCell<Option<WasmIcrcError>>,
    tick: Cell<u64>,
    latest_generation: Cell<u64>,
    actors_complete: Cell<bool>,
}

impl BalanceSyncEngine {
    /// `anonymous` is an unauthenticated actor for the aggregate ledger
    pub fn new(config: &AppConfig, anonymous: Rc<dyn LedgerActor>) -> BalanceSyncEngine {
        BalanceSyncEngine {
            counterparty: config.counterparty(),
            aggregate_target: config.aggregate().clone(),
            anonymous,
            snapshots: RefCell::new(BTreeMap::new()),
            aggregate: RefCell::new(None),
            failures: RefCell::new(BTreeMap::new()),
            aggregate_failure: RefCell::new(None),
            tick: Cell::new(0),
            latest_generation: Cell::new(0),
            actors_complete: Cell::new(false),
        }
    }

    pub fn snapshots(&self) -> BTreeMap<TokenId, BalanceSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn snapshot(&self, token: TokenId) -> Option<BalanceSnapshot> {
        self.snapshots.borrow().get(&token).copied()
    }

    /// Balance of `token` for `session`, zero until a pass for it completed
    pub fn balance(&self, token: TokenId, session: &Session) -> u128 {
        self.snapshot(token)
            .filter(|snapshot| !snapshot.is_stale(session))
            .map_or(0, |snapshot| snapshot.balance)
    }

    pub fn aggregate(&self) -> Option<AggregateSnapshot> {
        *self.aggregate.borrow()
    }

    pub fn aggregate_target(&self) -> &AggregateTarget {
        &self.aggregate_target
    }

    /// Tokens whose last query failed
    pub fn failures(&self) -> BTreeMap<TokenId, WasmIcrcError> {
        self.failures
            .borrow()
            .iter()
            .map(|(token, (_, err))| (*token, err.clone()))
            .collect()
    }

    pub fn aggregate_failure(&self) -> Option<WasmIcrcError> {
        self.aggregate_failure.borrow().clone()
    }

    /// React to `trigger`; returns the snapshots if a refresh ran
    pub async fn handle(
        &self,
        trigger: SyncTrigger,
        session: &Session,
        tokens: &[&TokenDescriptor],
    ) -> Option<BTreeMap<TokenId, BalanceSnapshot>> {
        match trigger {
            SyncTrigger::ActorsChanged => {
                let complete = session.actors_complete();
                let was_complete = self.actors_complete.replace(complete);
                if complete && !was_complete {
                    Some(self.refresh(session, tokens).await)
                } else {
                    None
                }
            }
            SyncTrigger::TransferCompleted => Some(self.refresh(session, tokens).await),
            SyncTrigger::SessionCleared => {
                self.actors_complete.set(false);
                self.observe_generation(session.generation());
                None
            }
        }
    }

    /// Query balances and allowances for every token with an actor
    ///
    /// The aggregate holdings query always runs. Per-token state is left as
    /// is for anonymous sessions and tokens without an actor; a token whose
    /// query fails keeps its previous snapshot.
    pub async fn refresh(
        &self,
        session: &Session,
        tokens: &[&TokenDescriptor],
    ) -> BTreeMap<TokenId, BalanceSnapshot> {
        let tick = self.next_tick();
        let generation = session.generation();
        self.observe_generation(generation);

        let owner = match session.principal() {
            Some(owner) if session.is_connected() => owner,
            _ => {
                self.refresh_aggregate_at(tick).await;
                return self.snapshots();
            }
        };

        let queries = tokens.iter().filter_map(|token| {
            session
                .actor(token.id)
                .map(|actor| self.query_token(token.id, actor, owner))
        });
        let (_, results) = futures::join!(self.refresh_aggregate_at(tick), join_all(queries));

        for (token, result) in results {
            match result {
                Ok((balance, allowance)) => {
                    self.store(BalanceSnapshot {
                        token,
                        balance,
                        allowance,
                        fetched_at: tick,
                        generation,
                    });
                }
                Err(err) => self.record_failure(token, generation, tick, err),
            }
        }

        self.snapshots()
    }

    /// Query only the counterparty's aggregate holdings
    pub async fn refresh_aggregate(&self) -> Option<AggregateSnapshot> {
        let tick = self.next_tick();
        self.refresh_aggregate_at(tick).await;
        self.aggregate()
    }

    async fn refresh_aggregate_at(&self, tick: u64) {
        let account = Account::of(self.aggregate_target.holder);
        let result = self
            .anonymous
            .icrc1_balance_of(account)
            .await
            .and_then(|amount| nat_to_u128(&amount));

        match result {
            Ok(amount) => {
                let mut aggregate = self.aggregate.borrow_mut();
                if aggregate.map_or(true, |current| current.fetched_at <= tick) {
                    *aggregate = Some(AggregateSnapshot {
                        amount,
                        fetched_at: tick,
                    });
                    self.aggregate_failure.borrow_mut().take();
                }
            }
            Err(err) => {
                log::warn!("aggregate holdings query failed: {}", err);
                *self.aggregate_failure.borrow_mut() = Some(err);
            }
        }
    }

    async fn query_token(
        &self,
        token: TokenId,
        actor: Rc<dyn LedgerActor>,
        owner: Principal,
    ) -> TokenResult {
        let account = Account::of(owner);
        let allowance_args = AllowanceArgs {
            account,
            spender: Account::of(self.counterparty),
        };
        let (balance, allowance) = futures::join!(
            actor.icrc1_balance_of(account),
            actor.icrc2_allowance(allowance_args)
        );

        let result = balance
            .and_then(|balance| nat_to_u128(&balance))
            .and_then(|balance| {
                let allowance = nat_to_u128(&allowance?.allowance)?;
                Ok((balance, allowance))
            });
        (token, result)
    }

    fn store(&self, snapshot: BalanceSnapshot) {
        if self.is_superseded(snapshot.token, snapshot.generation, snapshot.fetched_at) {
            return;
        }
        self.snapshots.borrow_mut().insert(snapshot.token, snapshot);
        self.failures.borrow_mut().remove(&snapshot.token);
    }

    fn record_failure(&self, token: TokenId, generation: u64, tick: u64, err: WasmIcrcError) {
        if self.is_superseded(token, generation, tick) {
            return;
        }
        log::warn!("refresh of {} failed: {}", token, err);
        self.failures.borrow_mut().insert(token, (tick, err));
    }

    /// Whether a result for `token` from pass (`generation`, `tick`) is older
    /// than what was already observed or written for it
    fn is_superseded(&self, token: TokenId, generation: u64, tick: u64) -> bool {
        if generation < self.latest_generation.get() {
            log::debug!("dropping {} result from superseded generation {}", token, generation);
            return true;
        }

        let newer_snapshot = self
            .snapshots
            .borrow()
            .get(&token)
            .is_some_and(|current| current.fetched_at > tick);
        let newer_failure = self
            .failures
            .borrow()
            .get(&token)
            .is_some_and(|(failed_at, _)| *failed_at > tick);
        if newer_snapshot || newer_failure {
            log::debug!("dropping out-of-order {} result", token);
            return true;
        }
        false
    }

    fn next_tick(&self) -> u64 {
        let tick = self.tick.get() + 1;
        self.tick.set(tick);
        tick
    }

    fn observe_generation(&self, generation: u64) {
        if generation > self.latest_generation.get() {
            self.latest_generation.set(generation);
        }
    }
}
