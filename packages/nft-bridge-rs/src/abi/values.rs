//! JSON <-> ABI value conversion
//!
//! Arguments arrive as JSON (HTTP bodies, orchestrator-built lists) and are
//! coerced against the declared parameter type. Return values are rendered
//! back to JSON with integers as decimal strings so no precision is lost.

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::Address;
use serde_json::Value;

/// Coerce one JSON argument into a value of the given ABI type.
pub fn coerce_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| coerce_value(inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!(
                    "expected {} elements for {}, got {}",
                    len,
                    ty.sol_type_name(),
                    items.len()
                ));
            }
            items
                .iter()
                .map(|item| coerce_value(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!(
                    "expected {} tuple members, got {}",
                    types.len(),
                    items.len()
                ));
            }
            types
                .iter()
                .zip(items)
                .map(|(t, item)| coerce_value(t, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(s)) => coerce_str(ty, s),
        (_, Value::Number(n)) => coerce_str(ty, &n.to_string()),
        (_, Value::Bool(b)) => coerce_str(ty, if *b { "true" } else { "false" }),
        (_, other) => Err(format!(
            "cannot convert {} to {}",
            other,
            ty.sol_type_name()
        )),
    }
}

fn coerce_str(ty: &DynSolType, s: &str) -> Result<DynSolValue, String> {
    ty.coerce_str(s)
        .map_err(|e| format!("cannot convert {:?} to {}: {}", s, ty.sol_type_name(), e))
}

/// Render a decoded ABI value as JSON.
pub fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(alloy::hex::encode_prefixed(&word.as_slice()[..*size]))
        }
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::Function(f) => Value::String(alloy::hex::encode_prefixed(f.as_slice())),
        DynSolValue::Bytes(b) => Value::String(alloy::hex::encode_prefixed(b)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{:?}", other)),
    }
}

/// Render a function's full output list: nothing -> null, one -> the value,
/// several -> an array.
pub fn outputs_to_json(values: &[DynSolValue]) -> Value {
    match values {
        [] => Value::Null,
        [single] => to_json(single),
        many => Value::Array(many.iter().map(to_json).collect()),
    }
}

/// First output as an address (e.g. `ownerOf`).
pub fn first_address(values: &[DynSolValue]) -> Option<Address> {
    match values.first()? {
        DynSolValue::Address(a) => Some(*a),
        _ => None,
    }
}

/// First output as a string (e.g. `tokenURI`).
pub fn first_string(values: &[DynSolValue]) -> Option<String> {
    match values.first()? {
        DynSolValue::String(s) => Some(s.clone()),
        _ => None,
    }
}
