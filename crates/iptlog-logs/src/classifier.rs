use regex::Regex;
use std::sync::LazyLock;

use iptlog_types::{FieldKind, FieldValue, parse_address};

use crate::error::FieldError;

/// Key/value separators, tried in order
const SEPARATORS: [char; 2] = ['=', ':'];

static BYTE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<bytes>\d+) bytes$").expect("valid byte count pattern"));

/// Outcome of classifying one token
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    /// A typed field with its lower-cased key
    Field { key: String, value: FieldValue },
    /// Neither a key/value pair nor a byte count
    Unparsed(String),
}

/// Maps raw tokens to typed fields
pub struct FieldClassifier;

impl FieldClassifier {
    /// Classify a token, coercing the value by the field's kind
    pub fn classify(token: &str) -> Result<Classified, FieldError> {
        if let Some(caps) = BYTE_COUNT.captures(token) {
            let digits = &caps["bytes"];
            let value = Self::parse_integer("bytes", digits)?;
            return Ok(Classified::Field {
                key: "bytes".to_string(),
                value,
            });
        }

        let Some((raw_key, raw_value)) = Self::split(token) else {
            return Ok(Classified::Unparsed(token.to_string()));
        };

        let value = match FieldKind::of(raw_key) {
            FieldKind::Integer => Self::parse_integer(raw_key, raw_value)?,
            FieldKind::Address => {
                let address =
                    parse_address(raw_value).map_err(|e| FieldError::MalformedField {
                        key: raw_key.to_lowercase(),
                        value: raw_value.to_string(),
                        reason: e.to_string(),
                    })?;
                FieldValue::Address(address)
            }
            // Hex fields stay textual, see FieldValue::as_hex
            FieldKind::Hex | FieldKind::ByteCount | FieldKind::Flag | FieldKind::Generic => {
                FieldValue::Text(raw_value.to_string())
            }
        };

        Ok(Classified::Field {
            key: raw_key.to_lowercase(),
            value,
        })
    }

    /// Split on the first separator that occurs in the token
    fn split(token: &str) -> Option<(&str, &str)> {
        SEPARATORS
            .iter()
            .find_map(|sep| token.split_once(*sep))
            .map(|(k, v)| (k.trim(), v.trim()))
    }

    fn parse_integer(key: &str, value: &str) -> Result<FieldValue, FieldError> {
        value
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|e| FieldError::MalformedField {
                key: key.to_lowercase(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }
}
