//! Rust to JavaScript value conversion
//!
//! Amounts are u128 minor units and always cross the boundary as BigInt.

use std::collections::BTreeMap;

use wasm_bindgen::prelude::*;

use crate::session::{LoginAffordance, Session};
use crate::sync::{AggregateSnapshot, BalanceSnapshot};
use crate::token::TokenId;
use crate::transfer::{TransactionIntent, TransferReceipt};
use crate::validation::{FieldWarning, ValidationVerdict};

/// Error type for JS conversion failures
#[derive(Debug, Clone)]
pub struct JsConversionError(String);

impl JsConversionError {
    pub fn new(msg: &str) -> Self {
        JsConversionError(msg.to_string())
    }
}

impl std::fmt::Display for JsConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<JsConversionError> for JsValue {
    fn from(err: JsConversionError) -> Self {
        js_sys::Error::new(&err.0).into()
    }
}

/// Trait for converting Rust types to JavaScript values
pub trait TryIntoJsValue {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError>;
}

impl TryIntoJsValue for String {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_str(self))
    }
}

impl TryIntoJsValue for &str {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_str(self))
    }
}

impl TryIntoJsValue for bool {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_bool(*self))
    }
}

impl TryIntoJsValue for u8 {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_f64(*self as f64))
    }
}

impl TryIntoJsValue for u64 {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(js_sys::BigInt::from(*self).into())
    }
}

impl TryIntoJsValue for u128 {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        // Convert to BigInt via string (BigInt::from only supports u64)
        let s = self.to_string();
        js_sys::BigInt::new(&JsValue::from_str(&s))
            .map(|b| b.into())
            .map_err(|_| JsConversionError::new("Failed to create BigInt"))
    }
}

impl<T: TryIntoJsValue> TryIntoJsValue for Option<T> {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        match self {
            Some(v) => v.try_to_js_value(),
            None => Ok(JsValue::undefined()),
        }
    }
}

impl<T: TryIntoJsValue> TryIntoJsValue for Vec<T> {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        let arr = js_sys::Array::new();
        for item in self {
            arr.push(&item.try_to_js_value()?);
        }
        Ok(arr.into())
    }
}

impl TryIntoJsValue for TokenId {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        Ok(JsValue::from_str(self.as_str()))
    }
}

/// Keyed by token name: `{ source: ..., destination: ... }`
impl<T: TryIntoJsValue> TryIntoJsValue for BTreeMap<TokenId, T> {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        let obj = js_sys::Object::new();
        for (token, value) in self {
            js_sys::Reflect::set(
                &obj,
                &JsValue::from_str(token.as_str()),
                &value.try_to_js_value()?,
            )
            .map_err(|_| JsConversionError::new(&format!("Failed to set property: {}", token)))?;
        }
        Ok(obj.into())
    }
}

impl TryIntoJsValue for BalanceSnapshot {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "token" => self.token,
            "balance" => self.balance,
            "allowance" => self.allowance,
            "fetchedAt" => self.fetched_at,
            "generation" => self.generation,
        )
    }
}

impl TryIntoJsValue for AggregateSnapshot {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "amount" => self.amount,
            "fetchedAt" => self.fetched_at,
        )
    }
}

impl TryIntoJsValue for ValidationVerdict {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "isSubmittable" => self.is_submittable,
            "tooLowAmount" => self.too_low_amount,
            "insufficientFunds" => self.insufficient_funds,
            "exceedsBalance" => self.exceeds_balance,
        )
    }
}

impl TryIntoJsValue for FieldWarning {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "message" => self.message(),
            "isError" => self.is_error(),
        )
    }
}

impl TryIntoJsValue for TransactionIntent {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "token" => self.token,
            "rawInput" => self.raw_input,
            "amount" => self.parsed_amount,
            "recipient" => self.recipient,
            "recipientValid" => self.recipient_principal().is_some(),
        )
    }
}

impl TryIntoJsValue for TransferReceipt {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        crate::js_obj!(
            "token" => self.token,
            "amount" => self.amount,
            "blockIndex" => self.block_index,
        )
    }
}

impl TryIntoJsValue for Session {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        let kind = serde_wasm_bindgen::to_value(&self.kind())
            .map_err(|e| JsConversionError::new(&format!("Serialization error: {}", e)))?;
        let obj: JsValue = crate::js_obj!(
            "principal" => self.principal_text(),
            "connected" => self.is_connected(),
            "generation" => self.generation(),
        )?;
        js_sys::Reflect::set(&obj, &JsValue::from_str("kind"), &kind)
            .map_err(|_| JsConversionError::new("Failed to set property: kind"))?;
        Ok(obj)
    }
}

impl TryIntoJsValue for LoginAffordance {
    fn try_to_js_value(&self) -> Result<JsValue, JsConversionError> {
        match self {
            LoginAffordance::ChooseLogin => crate::js_obj!("state" => "chooseLogin"),
            LoginAffordance::Busy(flow) => {
                let flow = serde_wasm_bindgen::to_value(flow)
                    .map_err(|e| JsConversionError::new(&format!("Serialization error: {}", e)))?;
                let obj: JsValue = crate::js_obj!("state" => "busy")?;
                js_sys::Reflect::set(&obj, &JsValue::from_str("flow"), &flow)
                    .map_err(|_| JsConversionError::new("Failed to set property: flow"))?;
                Ok(obj)
            }
            LoginAffordance::ConnectedAs { principal, .. } => crate::js_obj!(
                "state" => "connected",
                "principal" => principal.clone(),
            ),
        }
    }
}

/// Macro for building JavaScript objects
#[macro_export]
macro_rules! js_obj {
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        use $crate::wasm::try_into_js_value::{TryIntoJsValue, JsConversionError};
        let obj = js_sys::Object::new();
        $(
            js_sys::Reflect::set(
                &obj,
                &wasm_bindgen::JsValue::from_str($key),
                &TryIntoJsValue::try_to_js_value(&$value)?
            ).map_err(|_| JsConversionError::new(&format!("Failed to set property: {}", $key)))?;
        )*
        Ok::<wasm_bindgen::JsValue, JsConversionError>(obj.into())
    }};
}
