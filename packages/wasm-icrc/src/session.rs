//! Session and login lifecycle
//!
//! [`SessionManager`] is the only writer of the [`Session`]. It runs exactly
//! one of two login protocols at a time:
//!
//! - **Extension signer**: the injected provider grants a connection and
//!   hands back its own agent.
//! - **Delegated identity**: a fresh auth client opens the identity issuer,
//!   and on consent an agent is built for the delegated identity.
//!
//! Either way both ledger actors are registered under the resulting agent and
//! the session becomes `Connected`. Everyone else reads cloned snapshots of
//! the session.

use candid::Principal;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::config::{AppConfig, IssuerChoice};
use crate::error::WasmIcrcError;
use crate::ledger::LedgerActor;
use crate::provider::{Agent, AgentOptions, AuthClient, AuthClientFactory, ConnectRequest, ExtensionSigner};
use crate::token::TokenId;

/// How the current session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Anonymous,
    ExtensionSigner,
    DelegatedIdentity,
}

/// Login protocol being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoginFlow {
    ExtensionSigner,
    DelegatedIdentity,
}

impl LoginFlow {
    fn kind(self) -> SessionKind {
        match self {
            LoginFlow::ExtensionSigner => SessionKind::ExtensionSigner,
            LoginFlow::DelegatedIdentity => SessionKind::DelegatedIdentity,
        }
    }
}

/// Login state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Anonymous,
    AwaitingProvider(LoginFlow),
    Authenticating(LoginFlow),
    Connected(LoginFlow),
}

/// Connection state plus the actor handles issued for it
///
/// `generation` increases on every change of the actor set, so results
/// computed against an older session can be recognised and dropped.
#[derive(Clone)]
pub struct Session {
    kind: SessionKind,
    principal: Option<Principal>,
    actors: BTreeMap<TokenId, Rc<dyn LedgerActor>>,
    generation: u64,
}

impl Session {
    fn anonymous(generation: u64) -> Session {
        Session {
            kind: SessionKind::Anonymous,
            principal: None,
            actors: BTreeMap::new(),
            generation,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_connected(&self) -> bool {
        self.kind != SessionKind::Anonymous
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal
    }

    /// Principal as text, empty when anonymous
    pub fn principal_text(&self) -> String {
        self.principal.map(|p| p.to_text()).unwrap_or_default()
    }

    pub fn actor(&self, token: TokenId) -> Option<Rc<dyn LedgerActor>> {
        self.actors.get(&token).cloned()
    }

    /// Like [`Session::actor`], but a missing actor is `ActorUnavailable`
    pub fn require_actor(&self, token: TokenId) -> Result<Rc<dyn LedgerActor>, WasmIcrcError> {
        self.actor(token)
            .ok_or_else(|| WasmIcrcError::ActorUnavailable(token.to_string()))
    }

    /// Both the source and the destination actor exist
    pub fn actors_complete(&self) -> bool {
        TokenId::ALL.iter().all(|token| self.actors.contains_key(token))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind)
            .field("principal", &self.principal_text())
            .field("actors", &self.actors.keys().collect::<Vec<_>>())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Which login controls the UI should offer, derived from the session alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginAffordance {
    /// Show both login entry points
    ChooseLogin,
    /// A flow is running; all login controls disabled
    Busy(LoginFlow),
    /// Show the principal and a logout control for this kind
    ConnectedAs { kind: SessionKind, principal: String },
}

/// Credentials that must be signed out of on logout
enum Credentials {
    Extension(Rc<dyn ExtensionSigner>),
    Delegated(Rc<dyn AuthClient>),
}

struct SessionState {
    phase: LoginPhase,
    session: Session,
    credentials: Option<Credentials>,
}

/// Sole owner and writer of the [`Session`]
pub struct SessionManager {
    config: Rc<AppConfig>,
    state: RefCell<SessionState>,
}

impl SessionManager {
    pub fn new(config: Rc<AppConfig>) -> SessionManager {
        SessionManager {
            config,
            state: RefCell::new(SessionState {
                phase: LoginPhase::Anonymous,
                session: Session::anonymous(0),
                credentials: None,
            }),
        }
    }

    /// Read-only copy of the current session
    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn phase(&self) -> LoginPhase {
        self.state.borrow().phase
    }

    /// A login flow is in progress
    pub fn busy(&self) -> bool {
        matches!(
            self.phase(),
            LoginPhase::AwaitingProvider(_) | LoginPhase::Authenticating(_)
        )
    }

    pub fn affordance(&self) -> LoginAffordance {
        let state = self.state.borrow();
        match state.phase {
            LoginPhase::Anonymous => LoginAffordance::ChooseLogin,
            LoginPhase::AwaitingProvider(flow) | LoginPhase::Authenticating(flow) => {
                LoginAffordance::Busy(flow)
            }
            LoginPhase::Connected(_) => LoginAffordance::ConnectedAs {
                kind: state.session.kind,
                principal: state.session.principal_text(),
            },
        }
    }

    /// Log in through the injected extension signer
    ///
    /// `None` means no provider is injected in the page.
    pub async fn login_with_extension(
        &self,
        provider: Option<Rc<dyn ExtensionSigner>>,
    ) -> Result<Session, WasmIcrcError> {
        let flow = LoginFlow::ExtensionSigner;
        self.begin(flow)?;

        let provider = match provider {
            Some(provider) => provider,
            None => {
                let err = WasmIcrcError::LoginFailure("No extension signer found".to_string());
                return Err(self.fail(flow, err));
            }
        };

        self.set_phase(LoginPhase::Authenticating(flow));
        let request = ConnectRequest {
            whitelist: self.config.whitelist(),
            host: self.config.agent_host().to_string(),
        };
        let agent = match provider.request_connect(&request).await {
            Ok(agent) => agent,
            Err(err) => return Err(self.fail(flow, err)),
        };

        match self.register(&*agent).await {
            Ok((principal, actors)) => {
                Ok(self.connect(flow, principal, actors, Credentials::Extension(provider)))
            }
            Err(err) => Err(self.fail(flow, err)),
        }
    }

    /// Log in through the delegated-identity issuer
    pub async fn login_with_identity(
        &self,
        factory: &dyn AuthClientFactory,
        choice: IssuerChoice,
    ) -> Result<Session, WasmIcrcError> {
        let flow = LoginFlow::DelegatedIdentity;
        self.begin(flow)?;

        let client = match factory.create().await {
            Ok(client) => client,
            Err(err) => return Err(self.fail(flow, err)),
        };

        self.set_phase(LoginPhase::Authenticating(flow));
        let issuer = self.config.identity_issuer(choice);
        log::debug!("opening identity issuer {}", issuer);
        if let Err(err) = client.login(issuer).await {
            return Err(self.fail(flow, err));
        }

        let options = AgentOptions {
            host: self.config.agent_host().to_string(),
            fetch_root_key: self.config.fetch_root_key(),
        };
        let agent = match client.create_agent(&options).await {
            Ok(agent) => agent,
            Err(err) => return Err(self.fail(flow, err)),
        };

        match self.register(&*agent).await {
            Ok((principal, actors)) => {
                Ok(self.connect(flow, principal, actors, Credentials::Delegated(client)))
            }
            Err(err) => Err(self.fail(flow, err)),
        }
    }

    /// Drop the session and every handle issued for it
    ///
    /// The session is cleared before the provider is signed out, so nothing
    /// can pick up the old actors while the sign-out is pending.
    pub async fn logout(&self) -> Result<Session, WasmIcrcError> {
        let credentials = {
            let mut state = self.state.borrow_mut();
            if !matches!(state.phase, LoginPhase::Connected(_)) {
                return Err(WasmIcrcError::NotConnected);
            }
            let generation = state.session.generation + 1;
            state.phase = LoginPhase::Anonymous;
            state.session = Session::anonymous(generation);
            state.credentials.take()
        };

        let signed_out = match credentials {
            Some(Credentials::Extension(provider)) => provider.disconnect().await,
            Some(Credentials::Delegated(client)) => client.logout().await,
            None => Ok(()),
        };
        if let Err(err) = signed_out {
            log::warn!("provider sign-out failed: {}", err);
        }

        log::info!("logged out");
        Ok(self.session())
    }

    fn begin(&self, flow: LoginFlow) -> Result<(), WasmIcrcError> {
        let mut state = self.state.borrow_mut();
        match state.phase {
            LoginPhase::Anonymous => {
                state.phase = LoginPhase::AwaitingProvider(flow);
                Ok(())
            }
            LoginPhase::Connected(current) => Err(WasmIcrcError::SessionBusy(format!(
                "already connected via {:?}",
                current
            ))),
            LoginPhase::AwaitingProvider(current) | LoginPhase::Authenticating(current) => Err(
                WasmIcrcError::SessionBusy(format!("{:?} login in progress", current)),
            ),
        }
    }

    fn set_phase(&self, phase: LoginPhase) {
        self.state.borrow_mut().phase = phase;
    }

    /// Return to `Anonymous` and turn `err` into a login failure
    fn fail(&self, flow: LoginFlow, err: WasmIcrcError) -> WasmIcrcError {
        self.set_phase(LoginPhase::Anonymous);
        let err = match err {
            WasmIcrcError::LoginFailure(_) => err,
            other => WasmIcrcError::LoginFailure(other.to_string()),
        };
        log::warn!("{:?} login failed: {}", flow, err);
        err
    }

    /// Principal of `agent` and one ledger actor per configured token
    async fn register(
        &self,
        agent: &dyn Agent,
    ) -> Result<(Principal, BTreeMap<TokenId, Rc<dyn LedgerActor>>), WasmIcrcError> {
        let principal = agent.principal()?;
        let mut actors = BTreeMap::new();
        for token in self.config.tokens() {
            let actor = agent.ledger_actor(token.canister).await?;
            actors.insert(token.id, actor);
        }
        Ok((principal, actors))
    }

    fn connect(
        &self,
        flow: LoginFlow,
        principal: Principal,
        actors: BTreeMap<TokenId, Rc<dyn LedgerActor>>,
        credentials: Credentials,
    ) -> Session {
        let mut state = self.state.borrow_mut();
        let generation = state.session.generation + 1;
        state.phase = LoginPhase::Connected(flow);
        state.credentials = Some(credentials);
        state.session = Session {
            kind: flow.kind(),
            principal: Some(principal),
            actors,
            generation,
        };
        log::info!("connected via {:?} as {}", flow, principal);
        state.session.clone()
    }
}
