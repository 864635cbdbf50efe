//! WASM bindings for wasm-icrc
//!
//! This module contains thin wrappers with #[wasm_bindgen] that delegate
//! to the core Rust implementations, plus the adapters that let JavaScript
//! SDK objects stand in for ledgers and wallet providers.

pub mod amount;
pub mod bindings;
pub mod dapp;
pub(crate) mod try_from_js_value;
pub mod try_into_js_value;

use wasm_bindgen::prelude::*;

// Re-export WASM types
pub use amount::AmountNamespace;
pub use dapp::WasmDapp;

/// Install the panic hook and route `log` output to the browser console
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}
