//! wasm-icrc: WASM module for the token transaction engine of an ICRC dapp
//!
//! This crate provides:
//! - Exact decimal ↔ minor-unit amount conversion
//! - Fee and balance aware transfer validation
//! - Session management over two login protocols (extension signer and
//!   delegated identity)
//! - Balance/allowance synchronisation driven by discrete events
//! - `icrc1_transfer` submission
//!
//! # Architecture
//!
//! The crate follows a two-layer architecture:
//! - **Core layer** (`src/*.rs`): Pure Rust logic, no WASM dependencies
//! - **WASM layer** (`src/wasm/*.rs`): Thin wrappers with `#[wasm_bindgen]`
//!
//! Ledgers and wallet providers are reached through the async traits in
//! [`ledger`] and [`provider`]; the WASM layer implements them over the
//! JavaScript SDK objects handed in by the page.

pub mod amount;
pub mod config;
pub mod dapp;
pub mod error;
pub mod ledger;
pub mod principal;
pub mod provider;
pub mod session;
pub mod sync;
pub mod token;
pub mod transfer;
pub mod validation;
pub mod wasm;

#[cfg(test)]
mod test_utils;

// Re-export main types for convenience
pub use amount::{accept_input, format_amount, is_acceptable_input, parse_amount};
pub use config::{AppConfig, ConfigOverrides, IssuerChoice, NetworkMode};
pub use dapp::Dapp;
pub use error::WasmIcrcError;
pub use session::{LoginAffordance, Session, SessionKind, SessionManager};
pub use sync::{BalanceSnapshot, BalanceSyncEngine, SyncTrigger};
pub use token::{TokenDescriptor, TokenId};
pub use transfer::{submit_transfer, TransactionIntent, TransferReceipt};
pub use validation::{validate, FieldWarning, ValidationVerdict};
