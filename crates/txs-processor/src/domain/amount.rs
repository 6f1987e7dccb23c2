//! Serde glue for unbounded token amounts.
//!
//! Amounts travel as decimal strings so they survive JSON tooling that caps
//! numbers at 53 or 64 bits. Plain unsigned integers are accepted on input.

use std::fmt;

use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = BigUint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
        Ok(BigUint::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<BigUint, E> {
        Ok(BigUint::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
        u64::try_from(v)
            .map(BigUint::from)
            .map_err(|_| E::custom(format!("negative amount {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
        parse(v).map_err(E::custom)
    }
}

/// Parses a base-10 amount, rejecting signs, blanks and fractional parts.
pub fn parse(s: &str) -> Result<BigUint, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid amount {s:?}"));
    }
    trimmed
        .parse::<BigUint>()
        .map_err(|e| format!("invalid amount {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_values_beyond_u64() {
        let v = parse("340282366920938463463374607431768211457").expect("parse");
        assert_eq!(v.to_string(), "340282366920938463463374607431768211457");
    }

    #[test]
    fn parse_rejects_signed_and_fractional() {
        assert!(parse("-5").is_err());
        assert!(parse("1.5").is_err());
        assert!(parse("").is_err());
    }
}
