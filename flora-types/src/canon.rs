//! Deterministic canonicalization and hashing (component C1).
//!
//! `Canonical` is a total, JSON-shaped value. Canonicalizing and then
//! serializing two semantically equal values always yields identical bytes:
//! object keys are sorted lexicographically, absent fields are never
//! materialized (callers build `Canonical::Object` only from the fields they
//! want hashed), and non-finite numbers collapse to zero.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha384};

#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Canonical>),
    Object(BTreeMap<String, Canonical>),
}

impl Canonical {
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Canonical::Number(value)
        } else {
            Canonical::Number(0.0)
        }
    }

    pub fn object(fields: impl IntoIterator<Item = (String, Canonical)>) -> Self {
        Canonical::Object(fields.into_iter().collect())
    }

    /// Serializes this value to its canonical byte representation: no
    /// whitespace, lexicographically sorted object keys.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            Canonical::Null => out.push_str("null"),
            Canonical::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Canonical::Number(n) => {
                let num = serde_json::Number::from_f64(*n).unwrap_or_else(|| 0.into());
                out.push_str(&num.to_string());
            }
            Canonical::String(s) => {
                out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
            }
            Canonical::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out);
                }
                out.push(']');
            }
            Canonical::Object(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(k).expect("string serialization is infallible"));
                    out.push(':');
                    v.write(out);
                }
                out.push('}');
            }
        }
    }
}

impl From<&Value> for Canonical {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Canonical::Null,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Number(n) => Canonical::from_f64(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => Canonical::String(s.clone()),
            Value::Array(items) => Canonical::Array(items.iter().map(Canonical::from).collect()),
            Value::Object(map) => {
                Canonical::Object(map.iter().map(|(k, v)| (k.clone(), Canonical::from(v))).collect())
            }
        }
    }
}

impl From<Value> for Canonical {
    fn from(value: Value) -> Self {
        Canonical::from(&value)
    }
}

/// Anything that can describe itself as a canonical value for hashing.
pub trait ToCanonical {
    fn to_canonical(&self) -> Canonical;
}

impl ToCanonical for Value {
    fn to_canonical(&self) -> Canonical {
        Canonical::from(self)
    }
}

pub fn canonicalize(value: &Value) -> Canonical {
    Canonical::from(value)
}

pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_canonical_string()
}

/// SHA-384 digest, lower-case hex.
pub fn sha384_hex(bytes: &[u8]) -> String {
    hex::encode(Sha384::digest(bytes))
}

pub fn hash_canonical(value: &impl ToCanonical) -> String {
    sha384_hex(value.to_canonical().to_canonical_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn output_has_no_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "x"});
        let s = canonical_json(&v);
        assert!(!s.contains(' '));
        assert_eq!(s, r#"{"a":[1,2,3],"b":"x"}"#);
    }

    #[test]
    fn hash_is_deterministic() {
        let a = json!({"x": 1.5, "y": [true, null, "z"]});
        let b = json!({"y": [true, null, "z"], "x": 1.5});
        assert_eq!(hash_canonical(&a), hash_canonical(&b));
        assert_eq!(hash_canonical(&a).len(), 96);
    }

    #[test]
    fn non_finite_numbers_become_zero() {
        let c = Canonical::from_f64(f64::NAN);
        assert_eq!(c.to_canonical_string(), "0");
        let c = Canonical::from_f64(f64::INFINITY);
        assert_eq!(c.to_canonical_string(), "0");
    }
}
