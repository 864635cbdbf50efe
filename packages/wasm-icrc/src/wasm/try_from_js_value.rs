//! JavaScript to Rust value conversion
//!
//! Replies of the JS ledger SDK arrive as plain objects with BigInt amounts;
//! these impls turn them back into the candid types of [`crate::ledger`].

use candid::Nat;
use wasm_bindgen::{JsCast, JsValue};

use crate::error::WasmIcrcError;
use crate::ledger::{Allowance, TransferError, TransferResult};

/// Trait for converting JsValue to Rust types
pub(crate) trait TryFromJsValue: Sized {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError>;
}

fn invalid(msg: String) -> WasmIcrcError {
    WasmIcrcError::InvalidInput(msg)
}

impl TryFromJsValue for String {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        value
            .as_string()
            .ok_or_else(|| invalid("Expected a string".to_string()))
    }
}

/// Accepts a BigInt, a non-negative integral number or a decimal string
impl TryFromJsValue for u128 {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        let text = if value.is_bigint() {
            let bigint = value.clone().unchecked_into::<js_sys::BigInt>();
            String::from(
                bigint
                    .to_string(10)
                    .map_err(|_| invalid("Unprintable BigInt".to_string()))?,
            )
        } else if let Some(n) = value.as_f64() {
            if n < 0.0 || n.fract() != 0.0 || n > u64::MAX as f64 {
                return Err(invalid(format!("Expected a whole amount, got {}", n)));
            }
            return Ok(n as u128);
        } else if let Some(s) = value.as_string() {
            s
        } else {
            return Err(invalid("Expected a BigInt amount".to_string()));
        };

        text.parse::<u128>()
            .map_err(|_| invalid(format!("Amount {} is not a u128", text)))
    }
}

impl TryFromJsValue for u64 {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        let wide = u128::try_from_js_value(value)?;
        u64::try_from(wide).map_err(|_| invalid(format!("{} exceeds u64", wide)))
    }
}

impl TryFromJsValue for Nat {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        u128::try_from_js_value(value).map(Nat::from)
    }
}

/// Also accepts the candid JS encoding of `opt`: `[]` or `[value]`
impl<T: TryFromJsValue> TryFromJsValue for Option<T> {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        if value.is_undefined() || value.is_null() {
            Ok(None)
        } else if js_sys::Array::is_array(value) {
            let array = js_sys::Array::from(value);
            if array.length() == 0 {
                Ok(None)
            } else {
                T::try_from_js_value(&array.get(0)).map(Some)
            }
        } else {
            T::try_from_js_value(value).map(Some)
        }
    }
}

/// Get a raw JsValue field from an object without conversion
fn get_raw_field(obj: &JsValue, key: &str) -> Result<JsValue, WasmIcrcError> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .map_err(|_| invalid(format!("Failed to read {} from object", key)))
}

/// Get a field and convert it using TryFromJsValue
pub(crate) fn get_field<T: TryFromJsValue>(obj: &JsValue, key: &str) -> Result<T, WasmIcrcError> {
    let field_value = get_raw_field(obj, key)?;
    T::try_from_js_value(&field_value).map_err(|e| invalid(format!("{} (field: {})", e, key)))
}

fn has_field(obj: &JsValue, key: &str) -> bool {
    js_sys::Reflect::has(obj, &JsValue::from_str(key)).unwrap_or(false)
}

impl TryFromJsValue for Allowance {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        Ok(Allowance {
            allowance: get_field(value, "allowance")?,
            expires_at: get_field(value, "expires_at")?,
        })
    }
}

/// `{ Ok: blockIndex }` or `{ Err: { Variant: { ...fields } } }`
impl TryFromJsValue for TransferResult {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        if !value.is_object() {
            return Err(invalid("Expected a transfer result object".to_string()));
        }
        if has_field(value, "Ok") {
            return get_field::<Nat>(value, "Ok").map(Ok);
        }
        if has_field(value, "Err") {
            return TransferError::try_from_js_value(&get_raw_field(value, "Err")?).map(Err);
        }
        Err(invalid("Transfer result has neither Ok nor Err".to_string()))
    }
}

impl TryFromJsValue for TransferError {
    fn try_from_js_value(value: &JsValue) -> Result<Self, WasmIcrcError> {
        let object = value
            .dyn_ref::<js_sys::Object>()
            .ok_or_else(|| invalid("Expected a transfer error object".to_string()))?;
        let variant = js_sys::Object::keys(object)
            .get(0)
            .as_string()
            .ok_or_else(|| invalid("Transfer error without variant".to_string()))?;
        let fields = get_raw_field(value, &variant)?;

        let err = match variant.as_str() {
            "BadFee" => TransferError::BadFee {
                expected_fee: get_field(&fields, "expected_fee")?,
            },
            "BadBurn" => TransferError::BadBurn {
                min_burn_amount: get_field(&fields, "min_burn_amount")?,
            },
            "InsufficientFunds" => TransferError::InsufficientFunds {
                balance: get_field(&fields, "balance")?,
            },
            "TooOld" => TransferError::TooOld,
            "CreatedInFuture" => TransferError::CreatedInFuture {
                ledger_time: get_field(&fields, "ledger_time")?,
            },
            "Duplicate" => TransferError::Duplicate {
                duplicate_of: get_field(&fields, "duplicate_of")?,
            },
            "TemporarilyUnavailable" => TransferError::TemporarilyUnavailable,
            "GenericError" => TransferError::GenericError {
                error_code: get_field(&fields, "error_code")?,
                message: get_field(&fields, "message")?,
            },
            other => return Err(invalid(format!("Unknown transfer error variant {}", other))),
        };
        Ok(err)
    }
}

// WASM tests - only run in wasm32 target
#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn object(entries: &[(&str, JsValue)]) -> JsValue {
        let obj = js_sys::Object::new();
        for (key, value) in entries {
            js_sys::Reflect::set(&obj, &JsValue::from_str(key), value).unwrap();
        }
        obj.into()
    }

    fn bigint(text: &str) -> JsValue {
        js_sys::BigInt::new(&JsValue::from_str(text)).unwrap().into()
    }

    #[wasm_bindgen_test]
    fn test_u128_from_bigint() {
        let max = u128::MAX.to_string();
        assert_eq!(u128::try_from_js_value(&bigint(&max)).unwrap(), u128::MAX);
        assert_eq!(u128::try_from_js_value(&JsValue::from_f64(42.0)).unwrap(), 42);
        assert!(u128::try_from_js_value(&JsValue::from_f64(-1.0)).is_err());
    }

    #[wasm_bindgen_test]
    fn test_transfer_ok() {
        let reply = object(&[("Ok", bigint("17"))]);
        assert_eq!(
            TransferResult::try_from_js_value(&reply).unwrap(),
            Ok(Nat::from(17u64))
        );
    }

    #[wasm_bindgen_test]
    fn test_transfer_err_variants() {
        let bad_fee = object(&[(
            "Err",
            object(&[("BadFee", object(&[("expected_fee", bigint("10000"))]))]),
        )]);
        assert_eq!(
            TransferResult::try_from_js_value(&bad_fee).unwrap(),
            Err(TransferError::BadFee {
                expected_fee: Nat::from(10_000u64)
            })
        );

        let too_old = object(&[("Err", object(&[("TooOld", JsValue::NULL)]))]);
        assert_eq!(
            TransferResult::try_from_js_value(&too_old).unwrap(),
            Err(TransferError::TooOld)
        );
    }
}
