//! ICRC-1 / ICRC-2 ledger call surface
//!
//! Candid shapes of the three ledger methods the dapp consumes, and the
//! [`LedgerActor`] trait that authenticated (or anonymous) actor handles
//! implement. The ledger itself is never reimplemented here.

use async_trait::async_trait;
use candid::{CandidType, Deserialize, Nat, Principal};
use std::fmt;

use crate::error::WasmIcrcError;

pub type Subaccount = [u8; 32];

/// ICRC-1 account
#[derive(CandidType, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub owner: Principal,
    pub subaccount: Option<Subaccount>,
}

impl Account {
    /// Default-subaccount account of `owner`
    pub fn of(owner: Principal) -> Account {
        Account {
            owner,
            subaccount: None,
        }
    }
}

/// Arguments of `icrc1_transfer`
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferArg {
    pub from_subaccount: Option<Subaccount>,
    pub to: Account,
    pub amount: Nat,
    pub fee: Option<Nat>,
    pub memo: Option<Vec<u8>>,
    /// Nanoseconds since the Unix epoch
    pub created_at_time: Option<u64>,
}

/// Error variant of `icrc1_transfer`
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    BadFee { expected_fee: Nat },
    BadBurn { min_burn_amount: Nat },
    InsufficientFunds { balance: Nat },
    TooOld,
    CreatedInFuture { ledger_time: u64 },
    Duplicate { duplicate_of: Nat },
    TemporarilyUnavailable,
    GenericError { error_code: Nat, message: String },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::BadFee { expected_fee } => write!(f, "bad fee, expected {}", expected_fee),
            TransferError::BadBurn { min_burn_amount } => {
                write!(f, "burn below minimum of {}", min_burn_amount)
            }
            TransferError::InsufficientFunds { balance } => {
                write!(f, "insufficient funds, balance is {}", balance)
            }
            TransferError::TooOld => write!(f, "transaction too old"),
            TransferError::CreatedInFuture { ledger_time } => {
                write!(f, "created in the future, ledger time is {}", ledger_time)
            }
            TransferError::Duplicate { duplicate_of } => {
                write!(f, "duplicate of block {}", duplicate_of)
            }
            TransferError::TemporarilyUnavailable => write!(f, "ledger temporarily unavailable"),
            TransferError::GenericError {
                error_code,
                message,
            } => write!(f, "error {}: {}", error_code, message),
        }
    }
}

/// Result of `icrc1_transfer`; `Ok` carries the block index
pub type TransferResult = Result<Nat, TransferError>;

/// Arguments of `icrc2_allowance`
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AllowanceArgs {
    pub account: Account,
    pub spender: Account,
}

/// Reply of `icrc2_allowance`
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Allowance {
    pub allowance: Nat,
    pub expires_at: Option<u64>,
}

/// Remote-call proxy bound to one ledger canister and one identity
///
/// Implementations reject with `NetworkFailure` when the call itself fails;
/// a ledger-level transfer error comes back as `Ok(Err(..))`.
#[async_trait(?Send)]
pub trait LedgerActor {
    /// Ledger canister this actor talks to
    fn canister(&self) -> Principal;

    async fn icrc1_balance_of(&self, account: Account) -> Result<Nat, WasmIcrcError>;

    async fn icrc1_transfer(&self, arg: TransferArg) -> Result<TransferResult, WasmIcrcError>;

    async fn icrc2_allowance(&self, args: AllowanceArgs) -> Result<Allowance, WasmIcrcError>;
}

/// Convert a ledger `Nat` into minor units
pub fn nat_to_u128(value: &Nat) -> Result<u128, WasmIcrcError> {
    u128::try_from(&value.0)
        .map_err(|_| WasmIcrcError::NetworkFailure(format!("Amount {} exceeds u128", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candid::{Decode, Encode};

    #[test]
    fn test_transfer_arg_candid_shape() {
        let arg = TransferArg {
            from_subaccount: None,
            to: Account::of(Principal::from_text("qvwlv-uyaaa-aaaas-aidpq-cai").unwrap()),
            amount: Nat::from(30_000u64),
            fee: Some(Nat::from(10_000u64)),
            memo: None,
            created_at_time: Some(1_700_000_000_000_000_000),
        };
        let bytes = Encode!(&arg).unwrap();
        let decoded = Decode!(&bytes, TransferArg).unwrap();
        assert_eq!(decoded, arg);
    }

    #[test]
    fn test_transfer_result_decodes_ledger_error() {
        let reply: TransferResult = Err(TransferError::InsufficientFunds {
            balance: Nat::from(5u64),
        });
        let bytes = Encode!(&reply).unwrap();
        let decoded = Decode!(&bytes, TransferResult).unwrap();
        assert_eq!(decoded, reply);
        assert_eq!(
            decoded.unwrap_err().to_string(),
            "insufficient funds, balance is 5"
        );
    }

    #[test]
    fn test_nat_to_u128() {
        assert_eq!(nat_to_u128(&Nat::from(42u64)).unwrap(), 42);
        let huge = Nat::from(u128::MAX) + Nat::from(1u64);
        assert!(nat_to_u128(&huge).is_err());
    }
}
