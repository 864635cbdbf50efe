//! Error types for wasm-icrc

use thiserror::Error;
use wasm_bindgen::prelude::*;

/// Main error type for wasm-icrc operations
///
/// None of these are fatal: every variant degrades to a visible, recoverable
/// UI state on the JavaScript side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WasmIcrcError {
    /// Malformed decimal string or principal text
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Extension provider denied/absent or delegated consent failed
    #[error("Login failed: {0}")]
    LoginFailure(String),
    /// A login was requested while another flow is active or a session exists
    #[error("Session busy: {0}")]
    SessionBusy(String),
    /// Logout requested without a connected session
    #[error("Not connected")]
    NotConnected,
    /// Operation needs a ledger actor that does not exist yet
    #[error("Actor unavailable for {0}")]
    ActorUnavailable(String),
    /// The ledger answered with its own transfer error
    #[error("Transfer rejected: {0}")]
    TransferRejected(String),
    /// A canister query or agent call rejected
    #[error("Network failure: {0}")]
    NetworkFailure(String),
    /// Startup configuration could not be resolved
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WasmIcrcError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        WasmIcrcError::NetworkFailure(err.to_string())
    }

    /// True for errors that belong next to an input field rather than in a banner
    pub fn is_field_level(&self) -> bool {
        matches!(self, WasmIcrcError::InvalidInput(_))
    }
}

// Converts to JS Error with stack trace
impl From<WasmIcrcError> for JsValue {
    fn from(err: WasmIcrcError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}
