//! Fee and balance aware validation of a pending transfer
//!
//! The verdict reserves a second fee-equivalent margin beyond the transferred
//! amount: `candidate + (fee + 1)` must fit in the balance.

use crate::token::TokenDescriptor;

/// Outcome of validating a candidate amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub is_submittable: bool,
    pub too_low_amount: bool,
    pub insufficient_funds: bool,
    /// `candidate + (fee + 1)` exceeds the balance; selects the warning text
    pub exceeds_balance: bool,
}

/// Smallest meaningful transfer for a given fee
pub fn minimum_amount(fee: u128) -> u128 {
    fee.saturating_add(1)
}

/// Validate `candidate` against `fee` and `balance`, all in minor units
///
/// An amount whose reserve overflows a u128 can never be covered.
pub fn validate(candidate: u128, fee: u128, balance: u128) -> ValidationVerdict {
    // candidate < fee + 1, without the saturation of `minimum_amount`
    let too_low_amount = candidate <= fee;
    let exceeds_balance = fee
        .checked_add(1)
        .and_then(|minimum| candidate.checked_add(minimum))
        .map_or(true, |total| total > balance);
    let insufficient_funds = if balance <= fee {
        candidate > 0
    } else {
        exceeds_balance
    };

    ValidationVerdict {
        is_submittable: !insufficient_funds,
        too_low_amount,
        insufficient_funds,
        exceeds_balance,
    }
}

/// Non-blocking warning shown under an amount field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWarning {
    /// `errored` is false for an empty amount against a balance below the minimum
    InsufficientFunds { ticker: String, errored: bool },
    BelowMinimum { minimum: String, ticker: String },
}

impl FieldWarning {
    /// Warning for `verdict`
    ///
    /// The text follows `exceeds_balance` first, the error state follows
    /// `insufficient_funds`, so a zero amount on a short balance reads
    /// "not enough" without turning the field red.
    pub fn for_verdict(verdict: &ValidationVerdict, token: &TokenDescriptor) -> Option<FieldWarning> {
        if verdict.exceeds_balance {
            Some(FieldWarning::InsufficientFunds {
                ticker: token.ticker.clone(),
                errored: verdict.insufficient_funds,
            })
        } else if verdict.too_low_amount {
            Some(FieldWarning::BelowMinimum {
                minimum: token.display_amount(token.minimum_transfer()),
                ticker: token.ticker.clone(),
            })
        } else {
            None
        }
    }

    pub fn message(&self) -> String {
        match self {
            FieldWarning::InsufficientFunds { ticker, .. } => {
                format!("You don't have enough {}!", ticker)
            }
            FieldWarning::BelowMinimum { minimum, .. } => {
                format!("You must input at least {} to transfer.", minimum)
            }
        }
    }

    /// Whether the field should render in its error state
    pub fn is_error(&self) -> bool {
        matches!(self, FieldWarning::InsufficientFunds { errored: true, .. })
    }
}
