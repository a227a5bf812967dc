//! Decoding of array-shaped JSON records.
//!
//! A few Assemblyline payloads encode small records as JSON arrays instead of
//! objects, e.g. a heuristic is `["AL_PEEK_1", "Suspicious import"]`. Each
//! record type documents its layout and converts from the array through
//! [`take_strings`], which checks the arity before anything is read.

use serde_json::Value;
use thiserror::Error;

/// An array-shaped record did not have the documented layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionalError {
    /// Fewer elements than the layout requires.
    #[error("{record} expects at least {expected} elements, found {found}")]
    TooShort {
        /// Record type being decoded.
        record: &'static str,
        /// Required element count.
        expected: usize,
        /// Actual element count.
        found: usize,
    },
    /// An element that must be a string was some other JSON value.
    #[error("{record} element {index} must be a string")]
    NotAString {
        /// Record type being decoded.
        record: &'static str,
        /// Offending position.
        index: usize,
    },
}

/// Takes the first `N` elements of `values` as strings.
///
/// Trailing elements beyond `N` are ignored so the server can append fields.
pub(crate) fn take_strings<const N: usize>(
    record: &'static str,
    values: Vec<Value>,
) -> Result<[String; N], PositionalError> {
    if values.len() < N {
        return Err(PositionalError::TooShort {
            record,
            expected: N,
            found: values.len(),
        });
    }

    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (index, (slot, value)) in out.iter_mut().zip(values).enumerate() {
        match value {
            Value::String(text) => *slot = text,
            _ => return Err(PositionalError::NotAString { record, index }),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Vec<Value> {
        match value {
            Value::Array(items) => items,
            _ => unreachable!("test input must be an array"),
        }
    }

    #[test]
    fn test_take_strings_exact_arity() {
        let [a, b] = take_strings::<2>("heuristic", values(json!(["H1", "name"]))).unwrap();
        assert_eq!(a, "H1");
        assert_eq!(b, "name");
    }

    #[test]
    fn test_take_strings_ignores_trailing_elements() {
        let [a] = take_strings::<1>("tag", values(json!(["x", 3, null]))).unwrap();
        assert_eq!(a, "x");
    }

    #[test]
    fn test_take_strings_rejects_short_array() {
        let err = take_strings::<3>("attack", values(json!(["T1", "p"]))).unwrap_err();
        assert_eq!(
            err,
            PositionalError::TooShort {
                record: "attack",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_take_strings_rejects_non_string() {
        let err = take_strings::<2>("tag", values(json!(["x", 5]))).unwrap_err();
        assert_eq!(err, PositionalError::NotAString { record: "tag", index: 1 });
    }
}
