//! Application controller
//!
//! [`Dapp`] wires the session manager and the sync engine together and turns
//! user actions into [`SyncTrigger`] events.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::{AppConfig, IssuerChoice};
use crate::error::WasmIcrcError;
use crate::ledger::LedgerActor;
use crate::provider::{AuthClientFactory, ExtensionSigner};
use crate::session::{LoginAffordance, Session, SessionManager};
use crate::sync::{BalanceSnapshot, BalanceSyncEngine, SyncTrigger};
use crate::token::{TokenDescriptor, TokenId};
use crate::transfer::{now_nanos, submit_transfer, TransactionIntent, TransferReceipt};
use crate::validation::{FieldWarning, ValidationVerdict};

pub struct Dapp {
    config: Rc<AppConfig>,
    sessions: SessionManager,
    sync: BalanceSyncEngine,
    last_error: RefCell<Option<String>>,
    submitting: Cell<bool>,
}

/// Clears the in-flight transfer flag however the submission ends
struct Submitting<'a>(&'a Cell<bool>);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Dapp {
    /// `anonymous` is an unauthenticated actor for the aggregate ledger
    pub fn new(config: Rc<AppConfig>, anonymous: Rc<dyn LedgerActor>) -> Dapp {
        Dapp {
            sessions: SessionManager::new(config.clone()),
            sync: BalanceSyncEngine::new(&config, anonymous),
            config,
            last_error: RefCell::new(None),
            submitting: Cell::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.sessions.session()
    }

    pub fn affordance(&self) -> LoginAffordance {
        self.sessions.affordance()
    }

    pub fn sync(&self) -> &BalanceSyncEngine {
        &self.sync
    }

    /// Message of the last failure the user should see
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn clear_error(&self) {
        self.last_error.borrow_mut().take();
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.get()
    }

    /// Initial anonymous read of the counterparty's holdings
    pub async fn start(&self) {
        self.sync.refresh_aggregate().await;
    }

    pub async fn login_with_extension(
        &self,
        provider: Option<Rc<dyn ExtensionSigner>>,
    ) -> Result<Session, WasmIcrcError> {
        let session = self
            .sessions
            .login_with_extension(provider)
            .await
            .map_err(|err| self.record(err))?;
        self.dispatch(SyncTrigger::ActorsChanged, &session).await;
        Ok(session)
    }

    pub async fn login_with_identity(
        &self,
        factory: &dyn AuthClientFactory,
        choice: IssuerChoice,
    ) -> Result<Session, WasmIcrcError> {
        let session = self
            .sessions
            .login_with_identity(factory, choice)
            .await
            .map_err(|err| self.record(err))?;
        self.dispatch(SyncTrigger::ActorsChanged, &session).await;
        Ok(session)
    }

    pub async fn logout(&self) -> Result<Session, WasmIcrcError> {
        let session = self.sessions.logout().await.map_err(|err| self.record(err))?;
        self.dispatch(SyncTrigger::SessionCleared, &session).await;
        Ok(session)
    }

    /// Manual refresh of balances, allowances and the aggregate
    pub async fn refresh(&self) -> BTreeMap<TokenId, BalanceSnapshot> {
        let session = self.session();
        self.sync.refresh(&session, &self.config.tokens()).await
    }

    /// Current balance of `token`, zero until known for this session
    pub fn balance(&self, token: TokenId) -> u128 {
        self.sync.balance(token, &self.session())
    }

    pub fn intent(&self, token: TokenId, raw_input: &str, recipient: &str) -> TransactionIntent {
        TransactionIntent::new(self.config.token(token), raw_input, recipient)
    }

    pub fn verdict(&self, intent: &TransactionIntent) -> Option<ValidationVerdict> {
        intent.verdict(self.token(intent), self.balance(intent.token))
    }

    pub fn field_warning(&self, intent: &TransactionIntent) -> Option<FieldWarning> {
        let verdict = self.verdict(intent)?;
        FieldWarning::for_verdict(&verdict, self.token(intent))
    }

    /// Submit `intent`, then refresh once the ledger has answered
    ///
    /// Only one transfer may be in flight. Without a connected session this
    /// does nothing and returns `Ok(None)`.
    pub async fn transfer(
        &self,
        intent: &TransactionIntent,
    ) -> Result<Option<TransferReceipt>, WasmIcrcError> {
        if self.submitting.replace(true) {
            return Err(WasmIcrcError::SessionBusy(
                "a transfer is already in progress".to_string(),
            ));
        }
        let _submitting = Submitting(&self.submitting);

        let submitted_with = self.session();
        let result = submit_transfer(&submitted_with, self.token(intent), intent, now_nanos()).await;

        let reached_ledger = matches!(
            result,
            Ok(Some(_)) | Err(WasmIcrcError::TransferRejected(_))
        );
        if reached_ledger {
            // the actors may have been dropped while the call was pending
            let session = self.session();
            if session.generation() == submitted_with.generation() {
                self.dispatch(SyncTrigger::TransferCompleted, &session).await;
            } else {
                log::debug!("session changed during transfer, skipping refresh");
            }
        }

        match result {
            Ok(receipt) => {
                if receipt.is_some() {
                    self.clear_error();
                }
                Ok(receipt)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    fn token(&self, intent: &TransactionIntent) -> &TokenDescriptor {
        self.config.token(intent.token)
    }

    async fn dispatch(&self, trigger: SyncTrigger, session: &Session) {
        log::debug!("dispatching {:?} at generation {}", trigger, session.generation());
        self.sync
            .handle(trigger, session, &self.config.tokens())
            .await;
    }

    /// Keep banner-level errors for display; field-level ones are shown inline
    fn record(&self, err: WasmIcrcError) -> WasmIcrcError {
        if !err.is_field_level() {
            *self.last_error.borrow_mut() = Some(err.to_string());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionKind;
    use crate::test_utils::*;
    use futures::executor::block_on;

    const RECIPIENT: &str = "qvwlv-uyaaa-aaaas-aidpq-cai";

    struct Fixture {
        agent: Rc<FakeAgent>,
        dapp: Dapp,
    }

    impl Fixture {
        fn new() -> Fixture {
            let config = Rc::new(mainnet_config());
            let agent = FakeAgent::for_config(&config);
            let anonymous = FakeLedger::new(config.aggregate().ledger);
            anonymous.set_balance(config.aggregate().holder, 12_345);
            Fixture {
                dapp: Dapp::new(config, anonymous),
                agent,
            }
        }

        fn ledger(&self, token: TokenId) -> Rc<FakeLedger> {
            self.agent
                .ledger(self.dapp.config().token(token).canister)
        }

        fn login(&self) -> Rc<FakeExtension> {
            let extension = FakeExtension::granting(self.agent.clone());
            block_on(self.dapp.login_with_extension(Some(extension.clone()))).unwrap();
            extension
        }
    }

    #[test]
    fn test_start_reads_aggregate_anonymously() {
        let fx = Fixture::new();
        block_on(fx.dapp.start());
        assert_eq!(fx.dapp.sync().aggregate().unwrap().amount, 12_345);
        assert!(fx.dapp.sync().snapshots().is_empty());
    }

    #[test]
    fn test_login_refreshes_balances() {
        let fx = Fixture::new();
        fx.ledger(TokenId::Source).set_balance(user(), 300_000_000);

        fx.login();

        assert_eq!(fx.dapp.balance(TokenId::Source), 300_000_000);
        assert_eq!(fx.ledger(TokenId::Source).balance_queries.get(), 1);
        assert_eq!(fx.dapp.sync().aggregate().unwrap().amount, 12_345);
    }

    #[test]
    fn test_failed_login_is_recorded() {
        let fx = Fixture::new();
        let err = block_on(fx.dapp.login_with_extension(None)).unwrap_err();
        assert_eq!(fx.dapp.last_error(), Some(err.to_string()));
        assert_eq!(fx.dapp.affordance(), LoginAffordance::ChooseLogin);
    }

    #[test]
    fn test_logout_clears_and_refresh_is_noop() {
        let fx = Fixture::new();
        fx.ledger(TokenId::Source).set_balance(user(), 42);
        let extension = fx.login();
        assert_eq!(fx.dapp.balance(TokenId::Source), 42);

        let session = block_on(fx.dapp.logout()).unwrap();
        assert_eq!(session.kind(), SessionKind::Anonymous);
        assert_eq!(session.principal(), None);
        assert!(session.actor(TokenId::Source).is_none());
        assert_eq!(extension.disconnects.get(), 1);

        let queries = fx.ledger(TokenId::Source).balance_queries.get();
        block_on(fx.dapp.refresh());
        assert_eq!(fx.ledger(TokenId::Source).balance_queries.get(), queries);
        assert_eq!(fx.dapp.balance(TokenId::Source), 0);
    }

    #[test]
    fn test_field_warning_follows_balance() {
        let fx = Fixture::new();
        fx.ledger(TokenId::Destination).set_balance(user(), 50_000);
        fx.login();

        let ok = fx.dapp.intent(TokenId::Destination, "0.03", RECIPIENT);
        assert_eq!(fx.dapp.field_warning(&ok), None);

        let too_much = fx.dapp.intent(TokenId::Destination, "0.05", RECIPIENT);
        let warning = fx.dapp.field_warning(&too_much).unwrap();
        assert_eq!(warning.message(), "You don't have enough reBob!");

        let too_low = fx.dapp.intent(TokenId::Destination, "0.001", RECIPIENT);
        let warning = fx.dapp.field_warning(&too_low).unwrap();
        assert_eq!(warning.message(), "You must input at least 0.010001 to transfer.");
    }

    #[test]
    fn test_transfer_triggers_refresh() {
        let fx = Fixture::new();
        let ledger = fx.ledger(TokenId::Destination);
        ledger.set_balance(user(), 50_000);
        fx.login();
        let queries = ledger.balance_queries.get();

        let intent = fx.dapp.intent(TokenId::Destination, "0.03", RECIPIENT);
        let receipt = block_on(fx.dapp.transfer(&intent)).unwrap().unwrap();

        assert_eq!(receipt.amount, 30_000);
        assert_eq!(ledger.balance_queries.get(), queries + 1);
        assert!(!fx.dapp.is_submitting());
    }

    #[test]
    fn test_rejected_transfer_still_refreshes() {
        let fx = Fixture::new();
        let ledger = fx.ledger(TokenId::Destination);
        ledger.set_balance(user(), 50_000);
        fx.login();
        ledger.reject_transfers_with(crate::ledger::TransferError::TemporarilyUnavailable);
        let queries = ledger.balance_queries.get();

        let intent = fx.dapp.intent(TokenId::Destination, "0.03", RECIPIENT);
        let err = block_on(fx.dapp.transfer(&intent)).unwrap_err();

        assert!(matches!(err, WasmIcrcError::TransferRejected(_)));
        assert_eq!(ledger.balance_queries.get(), queries + 1);
        assert_eq!(fx.dapp.last_error(), Some(err.to_string()));
    }

    #[test]
    fn test_transfer_while_anonymous_is_noop() {
        let fx = Fixture::new();
        let intent = fx.dapp.intent(TokenId::Source, "1", RECIPIENT);
        assert_eq!(block_on(fx.dapp.transfer(&intent)), Ok(None));
        assert!(fx.ledger(TokenId::Source).transfers.borrow().is_empty());
    }

    #[test]
    fn test_logout_during_transfer_skips_refresh() {
        let fx = Fixture::new();
        let ledger = fx.ledger(TokenId::Destination);
        ledger.set_balance(user(), 50_000);
        fx.login();
        let queries = ledger.balance_queries.get();

        let intent = fx.dapp.intent(TokenId::Destination, "0.03", RECIPIENT);
        let release = ledger.hold_next_transfer();
        block_on(async {
            let transfer = fx.dapp.transfer(&intent);
            let logout = async {
                fx.dapp.logout().await.unwrap();
                release.send(()).unwrap();
            };
            let (receipt, _) = futures::join!(transfer, logout);
            assert!(receipt.unwrap().is_some());
        });

        assert_eq!(fx.dapp.session().kind(), SessionKind::Anonymous);
        assert_eq!(ledger.balance_queries.get(), queries);
        assert!(!fx.dapp.is_submitting());
    }

    #[test]
    fn test_one_transfer_in_flight() {
        let fx = Fixture::new();
        let ledger = fx.ledger(TokenId::Destination);
        ledger.set_balance(user(), 50_000);
        fx.login();

        let intent = fx.dapp.intent(TokenId::Destination, "0.03", RECIPIENT);
        let release = ledger.hold_next_query();
        block_on(async {
            // the first transfer parks in its follow-up refresh
            let first = fx.dapp.transfer(&intent);
            let second = async {
                let err = fx.dapp.transfer(&intent).await.unwrap_err();
                assert!(matches!(err, WasmIcrcError::SessionBusy(_)));
                release.send(()).unwrap();
            };
            let (first, _) = futures::join!(first, second);
            assert!(first.unwrap().is_some());
        });

        assert_eq!(ledger.transfers.borrow().len(), 1);
        assert!(!fx.dapp.is_submitting());
    }
}
