//! WASM bindings for the application controller
//!
//! Thin wrapper around core [`Dapp`] with #[wasm_bindgen]. Async operations
//! return Promises; amounts are BigInt minor units.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

use crate::config::{AppConfig, ConfigOverrides, IssuerChoice};
use crate::dapp::Dapp;
use crate::error::WasmIcrcError;
use crate::provider::ExtensionSigner;
use crate::token::TokenId;
use crate::wasm::bindings::{JsAuthFactoryAdapter, JsExtensionAdapter, JsLedgerActor};
use crate::wasm::try_into_js_value::TryIntoJsValue;

/// WASM-exposed dapp controller
#[wasm_bindgen]
pub struct WasmDapp {
    inner: Rc<Dapp>,
}

fn token_id(name: &str) -> Result<TokenId, WasmIcrcError> {
    TokenId::from_name(name)
        .ok_or_else(|| WasmIcrcError::InvalidInput(format!("Unknown token: {}", name)))
}

/// Location of the hosting page, empty outside a browser window
fn page_origin() -> String {
    web_sys::window()
        .and_then(|window| window.location().href().ok())
        .unwrap_or_default()
}

#[wasm_bindgen]
impl WasmDapp {
    /// Create the controller
    ///
    /// # Arguments
    /// * `config` - Optional overrides (`network`, `pageOrigin`, canister ids);
    ///   the page origin defaults to `window.location.href`
    /// * `aggregate_ledger` - Anonymous ledger object for the holdings query
    ///
    /// # Example Config
    /// ```json
    /// { "network": "local", "sourceCanister": "bd3sg-teaaa-aaaaa-qaaba-cai" }
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, aggregate_ledger: JsValue) -> Result<WasmDapp, JsValue> {
        let mut overrides: ConfigOverrides = if config.is_undefined() || config.is_null() {
            ConfigOverrides::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| WasmIcrcError::Config(format!("Invalid config: {}", e)))?
        };
        if overrides.page_origin.is_empty() {
            overrides.page_origin = page_origin();
        }

        let config = Rc::new(AppConfig::from_overrides(overrides)?);
        let anonymous = Rc::new(JsLedgerActor::new(
            config.aggregate().ledger,
            aggregate_ledger.unchecked_into(),
        ));
        log::info!(
            "dapp ready on {:?} (local replica: {})",
            config.network(),
            config.is_local_replica()
        );
        Ok(WasmDapp {
            inner: Rc::new(Dapp::new(config, anonymous)),
        })
    }

    /// Initial anonymous holdings query
    pub fn start(&self) -> js_sys::Promise {
        let dapp = self.inner.clone();
        future_to_promise(async move {
            dapp.start().await;
            Ok(dapp.sync().aggregate().try_to_js_value()?)
        })
    }

    /// Log in through the injected extension signer (`undefined` if absent)
    #[wasm_bindgen(js_name = loginWithExtension)]
    pub fn login_with_extension(&self, provider: JsValue) -> js_sys::Promise {
        let dapp = self.inner.clone();
        future_to_promise(async move {
            let provider = JsExtensionAdapter::from_value(provider)
                .map(|adapter| Rc::new(adapter) as Rc<dyn ExtensionSigner>);
            let session = dapp.login_with_extension(provider).await?;
            Ok(session.try_to_js_value()?)
        })
    }

    /// Log in through the delegated-identity issuer
    ///
    /// # Arguments
    /// * `factory` - Object whose `create()` resolves to a fresh auth client
    /// * `issuer` - 0 for identity.ic0.app, 1 for identity.internetcomputer.org
    #[wasm_bindgen(js_name = loginWithIdentity)]
    pub fn login_with_identity(&self, factory: JsValue, issuer: u32) -> js_sys::Promise {
        let dapp = self.inner.clone();
        future_to_promise(async move {
            let choice = IssuerChoice::from_index(issuer).ok_or_else(|| {
                WasmIcrcError::InvalidInput(format!("Unknown identity issuer: {}", issuer))
            })?;
            let factory = JsAuthFactoryAdapter::new(factory);
            let session = dapp.login_with_identity(&factory, choice).await?;
            Ok(session.try_to_js_value()?)
        })
    }

    pub fn logout(&self) -> js_sys::Promise {
        let dapp = self.inner.clone();
        future_to_promise(async move {
            let session = dapp.logout().await?;
            Ok(session.try_to_js_value()?)
        })
    }

    /// Refresh balances, allowances and the holdings aggregate
    ///
    /// # Returns
    /// `{ source?: snapshot, destination?: snapshot }`
    pub fn refresh(&self) -> js_sys::Promise {
        let dapp = self.inner.clone();
        future_to_promise(async move {
            let snapshots = dapp.refresh().await;
            Ok(snapshots.try_to_js_value()?)
        })
    }

    /// Submit a transfer of `amount` (decimal string) of `token` to `recipient`
    ///
    /// Resolves to the receipt, or `undefined` when not connected.
    pub fn transfer(&self, token: &str, amount: &str, recipient: &str) -> js_sys::Promise {
        let dapp = self.inner.clone();
        let intent = token_id(token).map(|token| dapp.intent(token, amount, recipient));
        future_to_promise(async move {
            let receipt = dapp.transfer(&intent?).await?;
            Ok(receipt.try_to_js_value()?)
        })
    }

    #[wasm_bindgen(getter)]
    pub fn session(&self) -> Result<JsValue, JsValue> {
        Ok(self.inner.session().try_to_js_value()?)
    }

    /// Which login controls to show
    #[wasm_bindgen(getter)]
    pub fn affordance(&self) -> Result<JsValue, JsValue> {
        Ok(self.inner.affordance().try_to_js_value()?)
    }

    #[wasm_bindgen(getter, js_name = isSubmitting)]
    pub fn is_submitting(&self) -> bool {
        self.inner.is_submitting()
    }

    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&self) {
        self.inner.clear_error()
    }

    /// Balance of `token` (BigInt), 0n until fetched for this session
    pub fn balance(&self, token: &str) -> Result<JsValue, JsValue> {
        let token = token_id(token)?;
        Ok(self.inner.balance(token).try_to_js_value()?)
    }

    #[wasm_bindgen(getter)]
    pub fn snapshots(&self) -> Result<JsValue, JsValue> {
        Ok(self.inner.sync().snapshots().try_to_js_value()?)
    }

    /// Counterparty's holdings of the aggregate token, `undefined` until fetched
    #[wasm_bindgen(getter)]
    pub fn aggregate(&self) -> Result<JsValue, JsValue> {
        Ok(self.inner.sync().aggregate().try_to_js_value()?)
    }

    #[wasm_bindgen(getter, js_name = aggregateDecimals)]
    pub fn aggregate_decimals(&self) -> u8 {
        self.inner.sync().aggregate_target().decimals
    }

    /// Messages of the tokens whose last refresh failed
    #[wasm_bindgen(getter)]
    pub fn failures(&self) -> Result<JsValue, JsValue> {
        let messages = self
            .inner
            .sync()
            .failures()
            .into_iter()
            .map(|(token, err)| (token, err.to_string()))
            .collect::<std::collections::BTreeMap<_, _>>();
        Ok(messages.try_to_js_value()?)
    }

    /// Token metadata: `{ ticker, decimals, fee, canisterId }`
    #[wasm_bindgen(js_name = tokenInfo)]
    pub fn token_info(&self, token: &str) -> Result<JsValue, JsValue> {
        let token = self.inner.config().token(token_id(token)?);
        Ok(crate::js_obj!(
            "ticker" => token.ticker,
            "decimals" => token.decimals,
            "fee" => token.fee,
            "canisterId" => token.canister.to_text(),
        )?)
    }

    /// Keystroke filter for the amount field of `token`
    #[wasm_bindgen(js_name = acceptInput)]
    pub fn accept_input(&self, token: &str, current: &str, candidate: &str) -> Result<String, JsValue> {
        let decimals = self.inner.config().token(token_id(token)?).decimals;
        Ok(crate::amount::accept_input(current, candidate, decimals).to_string())
    }

    /// Parsed intent: `{ token, rawInput, amount?, recipient, recipientValid }`
    pub fn intent(&self, token: &str, amount: &str, recipient: &str) -> Result<JsValue, JsValue> {
        let intent = self.inner.intent(token_id(token)?, amount, recipient);
        Ok(intent.try_to_js_value()?)
    }

    /// Verdict for `amount` against the current balance; `undefined` if unparseable
    pub fn verdict(&self, token: &str, amount: &str) -> Result<JsValue, JsValue> {
        let intent = self.inner.intent(token_id(token)?, amount, "");
        Ok(self.inner.verdict(&intent).try_to_js_value()?)
    }

    /// Warning under the amount field: `{ message, isError }` or `undefined`
    #[wasm_bindgen(js_name = fieldWarning)]
    pub fn field_warning(&self, token: &str, amount: &str) -> Result<JsValue, JsValue> {
        let intent = self.inner.intent(token_id(token)?, amount, "");
        Ok(self.inner.field_warning(&intent).try_to_js_value()?)
    }
}
