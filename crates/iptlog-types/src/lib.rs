//! Shared types for iptlog
//!
//! This crate contains data structures used across multiple iptlog crates.

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{AddrParseError, IpAddr};
use std::str::FromStr;

// ============================================================================
// Addresses
// ============================================================================

/// A parsed network address as logged in SRC= and DST= fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(IpAddr);

impl Address {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    /// Get the underlying IP address
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    pub fn is_ipv6(&self) -> bool {
        self.0.is_ipv6()
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl FromStr for Address {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Parse an IPv4 or IPv6 address
pub fn parse_address(text: &str) -> Result<Address, AddrParseError> {
    text.trim().parse::<IpAddr>().map(Address)
}

/// Format an address in its canonical text form
pub fn format_address(address: &Address) -> String {
    address.0.to_string()
}

// ============================================================================
// Field Classification
// ============================================================================

/// Tokens that stand alone as boolean flags
pub const FLAGS: &[&str] = &[
    "ACK",
    "CWR",
    "DF",
    "ECE",
    "FIN",
    "INCOMPLETE",
    "PSH",
    "RST",
    "SYN",
    "URG",
];

/// Fields holding a network address
pub const ADDRESS_FIELDS: &[&str] = &["SRC", "DST"];

/// Fields holding a base-10 integer
pub const INTEGER_FIELDS: &[&str] = &["DPT", "FLOWLBL", "ID", "SPT", "TTL", "URGP", "WINDOW"];

/// Fields holding a hex string, kept as text
pub const HEX_FIELDS: &[&str] = &["PREC", "RES", "TOS"];

/// Semantic kind of a log field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Flag,
    Address,
    Integer,
    Hex,
    ByteCount,
    Generic,
}

impl FieldKind {
    /// Classify a raw field key (case-insensitive)
    pub fn of(key: &str) -> Self {
        let upper = key.to_ascii_uppercase();
        let upper = upper.as_str();

        if FLAGS.contains(&upper) {
            Self::Flag
        } else if ADDRESS_FIELDS.contains(&upper) {
            Self::Address
        } else if INTEGER_FIELDS.contains(&upper) {
            Self::Integer
        } else if HEX_FIELDS.contains(&upper) {
            Self::Hex
        } else if upper == "BYTES" {
            Self::ByteCount
        } else {
            Self::Generic
        }
    }
}

/// Returns true if the token is exactly a known flag name
pub fn is_flag(token: &str) -> bool {
    FLAGS.contains(&token)
}

// ============================================================================
// Field Values
// ============================================================================

/// A typed field value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Address(Address),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    /// Interpret a text value such as `0x10` as hex
    pub fn as_hex(&self) -> Option<u32> {
        let text = self.as_str()?;
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        u32::from_str_radix(digits, 16).ok()
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Address(a) => serde_json::Value::String(format_address(a)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Address(a) => write!(f, "{}", a),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::Address(a) => a.serialize(serializer),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<Address> for FieldValue {
    fn from(a: Address) -> Self {
        Self::Address(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let v4 = parse_address("10.0.0.1").unwrap();
        assert_eq!(format_address(&v4), "10.0.0.1");
        assert!(!v4.is_ipv6());

        let v6 = parse_address("fe80:0000:0000:0000:0000:0000:0000:0001").unwrap();
        assert_eq!(format_address(&v6), "fe80::1");
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn test_field_kind() {
        assert_eq!(FieldKind::of("SRC"), FieldKind::Address);
        assert_eq!(FieldKind::of("dpt"), FieldKind::Integer);
        assert_eq!(FieldKind::of("TOS"), FieldKind::Hex);
        assert_eq!(FieldKind::of("SYN"), FieldKind::Flag);
        assert_eq!(FieldKind::of("bytes"), FieldKind::ByteCount);
        assert_eq!(FieldKind::of("MAC"), FieldKind::Generic);
    }

    #[test]
    fn test_flags_match_literally() {
        assert!(is_flag("SYN"));
        assert!(!is_flag("syn"));
        assert!(!is_flag("SYN=1"));
    }

    #[test]
    fn test_hex_value() {
        assert_eq!(FieldValue::from("0x10").as_hex(), Some(16));
        assert_eq!(FieldValue::from("0x00").as_hex(), Some(0));
        assert_eq!(FieldValue::Integer(16).as_hex(), None);
    }

    #[test]
    fn test_field_value_json() {
        let addr = parse_address("192.168.1.1").unwrap();
        assert_eq!(
            serde_json::to_string(&FieldValue::Address(addr)).unwrap(),
            "\"192.168.1.1\""
        );
        assert_eq!(FieldValue::Integer(53).to_json(), serde_json::json!(53));
    }
}
