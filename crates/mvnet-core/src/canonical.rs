//! Canonical JSON codec and SHA-256 fingerprinting.
//!
//! Every hash in the workbench (snapshot fingerprint, solver-input hash,
//! result-set signature, catalog manifest) is produced by this module and
//! nowhere else. The contract is byte-level: two structurally equal value
//! trees canonicalize to identical bytes regardless of map insertion order
//! or the order in which id-carrying records were appended to a list.
//!
//! Canonicalization rules, applied recursively:
//!
//! 1. Object keys are NFC-normalized, trimmed, and serialized in code-point
//!    order.
//! 2. Arrays whose elements are all objects carrying an id-like key
//!    (`id` > `ref_id` > `node_id` > `branch_id`) are sorted ascending by
//!    that key; all other arrays keep their order.
//! 3. Strings are NFC-normalized and trimmed of outer whitespace.
//! 4. Floats are rounded to 6 decimal places (round half to even); results
//!    that are whole numbers are emitted as integers. NaN and ±∞ are
//!    rejected.
//! 5. Complex numbers are encoded as `{"im": …, "re": …}`.
//! 6. Booleans, integers, and null pass through.
//!
//! The serialized form carries no structural whitespace and is UTF-8.

use num_complex::Complex64;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Number of decimal places kept for floats in canonical payloads.
const FLOAT_DECIMALS: i32 = 6;

/// Key names that make a list of objects sortable, in priority order.
const ID_KEYS: [&str; 4] = ["id", "ref_id", "node_id", "branch_id"];

/// Errors raised while canonicalizing a value tree.
#[derive(Debug, Error)]
pub enum CodecError {
    /// NaN or ±∞ encountered; non-finite numbers are forbidden in hashed
    /// artifacts.
    #[error("non-finite number cannot enter a canonical payload")]
    NonFinite,

    /// The value tree could not be serialized to JSON bytes.
    #[error("canonical serialization failed: {0}")]
    Serialize(String),
}

/// Convenience alias for codec results.
pub type CodecResult<T> = Result<T, CodecError>;

/// Wrap an `f64` for inclusion in a canonical tree.
///
/// This is the single entry point for floats: non-finite values are
/// rejected here rather than surfacing later as a serialization failure.
pub fn float_value(value: f64) -> CodecResult<Value> {
    if !value.is_finite() {
        return Err(CodecError::NonFinite);
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(CodecError::NonFinite)
}

/// Encode a complex number as `{"im": …, "re": …}`.
pub fn complex_value(value: Complex64) -> CodecResult<Value> {
    let mut map = Map::new();
    map.insert("im".to_string(), float_value(value.im)?);
    map.insert("re".to_string(), float_value(value.re)?);
    Ok(Value::Object(map))
}

/// Round half to even at a fixed number of decimals.
fn round_half_even(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    let floor = scaled.floor();
    let frac = scaled - floor;
    // Ties are resolved toward the even neighbour; everything else rounds
    // to nearest. The tie window absorbs binary representation error.
    let rounded = if (frac - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

fn canonical_number(number: &Number) -> CodecResult<Value> {
    if number.is_i64() || number.is_u64() {
        return Ok(Value::Number(number.clone()));
    }
    let raw = number.as_f64().ok_or(CodecError::NonFinite)?;
    if !raw.is_finite() {
        return Err(CodecError::NonFinite);
    }
    let rounded = round_half_even(raw, FLOAT_DECIMALS);
    if rounded.fract() == 0.0 && rounded.abs() < i64::MAX as f64 {
        return Ok(Value::Number(Number::from(rounded as i64)));
    }
    Number::from_f64(rounded)
        .map(Value::Number)
        .ok_or(CodecError::NonFinite)
}

fn canonical_string(raw: &str) -> String {
    raw.nfc().collect::<String>().trim().to_string()
}

/// The id-like key shared by every element of `items`, if any.
fn sortable_id_key(items: &[Value]) -> Option<&'static str> {
    if items.is_empty() {
        return None;
    }
    ID_KEYS.iter().copied().find(|key| {
        items
            .iter()
            .all(|item| matches!(item, Value::Object(map) if map.contains_key(*key)))
    })
}

/// Sort key for one record in an id-sorted list.
fn record_sort_key(item: &Value, id_key: &str) -> String {
    match item.get(id_key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Apply the canonicalization rules recursively.
///
/// The returned tree serializes to the canonical byte form: `serde_json`
/// maps iterate in key order, so a plain compact serialization of the
/// result is already canonical.
pub fn canonicalize(value: &Value) -> CodecResult<Value> {
    match value {
        Value::Null | Value::Bool(_) => Ok(value.clone()),
        Value::Number(number) => canonical_number(number),
        Value::String(raw) => Ok(Value::String(canonical_string(raw))),
        Value::Array(items) => {
            let mut canon: Vec<Value> = items
                .iter()
                .map(canonicalize)
                .collect::<CodecResult<Vec<_>>>()?;
            if let Some(id_key) = sortable_id_key(&canon) {
                canon.sort_by_key(|item| record_sort_key(item, id_key));
            }
            Ok(Value::Array(canon))
        }
        Value::Object(map) => {
            let mut canon = Map::new();
            for (key, item) in map {
                canon.insert(canonical_string(key), canonicalize(item)?);
            }
            Ok(Value::Object(canon))
        }
    }
}

/// Canonical UTF-8 bytes for a value tree.
pub fn canonical_bytes(value: &Value) -> CodecResult<Vec<u8>> {
    let canon = canonicalize(value)?;
    serde_json::to_vec(&canon).map_err(|err| CodecError::Serialize(err.to_string()))
}

/// Lowercase SHA-256 hex digest of the canonical bytes of `value`.
pub fn fingerprint(value: &Value) -> CodecResult<String> {
    let bytes = canonical_bytes(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

/// Encode bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
