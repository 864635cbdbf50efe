//! WASM bindings for amount conversion and validation
//!
//! AmountNamespace provides static, session-independent helpers for the
//! amount fields.

use wasm_bindgen::prelude::*;

use crate::amount::{accept_input, format_amount, is_acceptable_input, parse_amount};
use crate::principal::is_valid_principal;
use crate::validation::validate;
use crate::wasm::try_from_js_value::TryFromJsValue;
use crate::wasm::try_into_js_value::TryIntoJsValue;

/// Namespace for amount operations
#[wasm_bindgen]
pub struct AmountNamespace;

#[wasm_bindgen]
impl AmountNamespace {
    /// Parse a decimal string into minor units
    ///
    /// # Returns
    /// Amount as BigInt; `""` and `"."` parse to 0n
    #[wasm_bindgen(js_name = parseAmount)]
    pub fn parse_amount_wasm(raw: &str, decimals: u8) -> Result<JsValue, JsValue> {
        let amount = parse_amount(raw, decimals)?;
        Ok(amount.try_to_js_value()?)
    }

    /// Render minor units (BigInt) as a decimal string without trailing zeros
    #[wasm_bindgen(js_name = formatAmount)]
    pub fn format_amount_wasm(amount: JsValue, decimals: u8) -> Result<String, JsValue> {
        let amount = u128::try_from_js_value(&amount)?;
        Ok(format_amount(amount, decimals))
    }

    /// Whether `raw` may appear in an amount field with `decimals` places
    #[wasm_bindgen(js_name = isAcceptableInput)]
    pub fn is_acceptable_input_wasm(raw: &str, decimals: u8) -> bool {
        is_acceptable_input(raw, decimals)
    }

    /// Keystroke filter: `candidate` if acceptable, `current` otherwise
    #[wasm_bindgen(js_name = acceptInput)]
    pub fn accept_input_wasm(current: &str, candidate: &str, decimals: u8) -> String {
        accept_input(current, candidate, decimals).to_string()
    }

    /// Validate a candidate amount against fee and balance (all BigInt minor units)
    ///
    /// # Returns
    /// `{ isSubmittable, tooLowAmount, insufficientFunds, exceedsBalance }`
    #[wasm_bindgen(js_name = validate)]
    pub fn validate_wasm(candidate: JsValue, fee: JsValue, balance: JsValue) -> Result<JsValue, JsValue> {
        let verdict = validate(
            u128::try_from_js_value(&candidate)?,
            u128::try_from_js_value(&fee)?,
            u128::try_from_js_value(&balance)?,
        );
        Ok(verdict.try_to_js_value()?)
    }

    #[wasm_bindgen(js_name = isValidPrincipal)]
    pub fn is_valid_principal_wasm(text: &str) -> bool {
        is_valid_principal(text)
    }
}
