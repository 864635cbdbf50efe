//! Transfer intents and `icrc1_transfer` submission

use candid::{Nat, Principal};

use crate::amount::parse_amount;
use crate::error::WasmIcrcError;
use crate::ledger::{nat_to_u128, Account, TransferArg};
use crate::principal::parse_principal;
use crate::session::Session;
use crate::token::{TokenDescriptor, TokenId};
use crate::validation::{validate, ValidationVerdict};

/// What the user is about to send, rebuilt on every keystroke
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    pub token: TokenId,
    pub raw_input: String,
    /// `None` when the input does not describe a representable amount
    pub parsed_amount: Option<u128>,
    pub recipient: String,
}

impl TransactionIntent {
    pub fn new(token: &TokenDescriptor, raw_input: &str, recipient: &str) -> TransactionIntent {
        TransactionIntent {
            token: token.id,
            raw_input: raw_input.to_string(),
            parsed_amount: parse_amount(raw_input, token.decimals).ok(),
            recipient: recipient.to_string(),
        }
    }

    pub fn recipient_principal(&self) -> Option<Principal> {
        parse_principal(&self.recipient)
    }

    /// Verdict against `balance`; `None` for an unparseable amount
    pub fn verdict(&self, token: &TokenDescriptor, balance: u128) -> Option<ValidationVerdict> {
        self.parsed_amount
            .map(|amount| validate(amount, token.fee, balance))
    }

    /// Everything needed for the submit control to be enabled
    pub fn is_ready(&self, token: &TokenDescriptor, balance: u128) -> bool {
        let verdict_ok = self
            .verdict(token, balance)
            .is_some_and(|verdict| verdict.is_submittable && !verdict.too_low_amount);
        verdict_ok && self.recipient_principal().is_some()
    }
}

/// Ledger acknowledgement of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    pub token: TokenId,
    pub amount: u128,
    pub block_index: u128,
}

/// Nanoseconds since the Unix epoch, used as `created_at_time`
#[cfg(target_arch = "wasm32")]
pub fn now_nanos() -> u64 {
    (js_sys::Date::now() as u64).saturating_mul(1_000_000)
}

/// Nanoseconds since the Unix epoch, used as `created_at_time`
#[cfg(not(target_arch = "wasm32"))]
pub fn now_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Build the `icrc1_transfer` arguments for `intent`
pub fn transfer_arg(
    token: &TokenDescriptor,
    intent: &TransactionIntent,
    created_at_time: u64,
) -> Result<TransferArg, WasmIcrcError> {
    let amount = intent.parsed_amount.ok_or_else(|| {
        WasmIcrcError::InvalidInput(format!("'{}' is not a valid amount", intent.raw_input))
    })?;
    let recipient = intent.recipient_principal().ok_or_else(|| {
        WasmIcrcError::InvalidInput(format!("'{}' is not a valid principal", intent.recipient))
    })?;

    Ok(TransferArg {
        from_subaccount: None,
        to: Account::of(recipient),
        amount: Nat::from(amount),
        fee: Some(Nat::from(token.fee)),
        memo: None,
        created_at_time: Some(created_at_time),
    })
}

/// Submit `intent` through the session's actor for `token`
///
/// Without an actor this is a silent no-op returning `Ok(None)`. Balances are
/// not adjusted here; the caller refreshes once the ledger has answered.
pub async fn submit_transfer(
    session: &Session,
    token: &TokenDescriptor,
    intent: &TransactionIntent,
    created_at_time: u64,
) -> Result<Option<TransferReceipt>, WasmIcrcError> {
    let actor = match session.require_actor(token.id) {
        Ok(actor) => actor,
        Err(err) => {
            log::debug!("{}, transfer skipped", err);
            return Ok(None);
        }
    };

    let arg = transfer_arg(token, intent, created_at_time)?;
    let amount = nat_to_u128(&arg.amount)?;

    match actor.icrc1_transfer(arg).await? {
        Ok(block_index) => {
            log::info!(
                "{} transfer accepted by {} at block {}",
                token.ticker,
                actor.canister(),
                block_index
            );
            Ok(Some(TransferReceipt {
                token: token.id,
                amount,
                block_index: nat_to_u128(&block_index)?,
            }))
        }
        Err(err) => {
            log::warn!("{} transfer rejected by {}: {}", token.ticker, actor.canister(), err);
            Err(WasmIcrcError::TransferRejected(err.to_string()))
        }
    }
}
