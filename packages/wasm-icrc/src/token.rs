//! Token descriptors

use candid::Principal;
use std::fmt;

use crate::amount::format_amount;
use crate::validation::minimum_amount;

/// The two ledgers the dapp converts between
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenId {
    /// Token deposited into the counterparty canister (Bob)
    Source,
    /// Token minted by the counterparty canister (reBob)
    Destination,
}

impl TokenId {
    pub const ALL: [TokenId; 2] = [TokenId::Source, TokenId::Destination];

    pub fn as_str(self) -> &'static str {
        match self {
            TokenId::Source => "source",
            TokenId::Destination => "destination",
        }
    }

    pub fn from_name(name: &str) -> Option<TokenId> {
        match name {
            "source" => Some(TokenId::Source),
            "destination" => Some(TokenId::Destination),
            _ => None,
        }
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one ICRC-1 token
///
/// `fee` is in the same minor units as every amount of this token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub id: TokenId,
    pub ticker: String,
    pub decimals: u8,
    pub fee: u128,
    /// Ledger canister
    pub canister: Principal,
}

impl TokenDescriptor {
    /// Smallest transfer that is not economically meaningless once the fee is charged
    pub fn minimum_transfer(&self) -> u128 {
        minimum_amount(self.fee)
    }

    /// Render minor units of this token for display
    pub fn display_amount(&self, amount: u128) -> String {
        format_amount(amount, self.decimals)
    }
}
