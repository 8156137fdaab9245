//! Validation helpers for Confreg
//!
//! Names and idempotency tokens are embedded verbatim in storage keys, so
//! they are checked here before any request reaches the store.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{ConfregError, Result};

/// Regex pattern for validating identifiers (names, tokens)
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Separator between `key=value` pairs in a label filter
pub const FILTER_PAIR_SEPARATOR: char = ',';

/// Separator between a label key and its value
pub const FILTER_KV_SEPARATOR: char = '=';

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use confreg_common::is_valid;
///
/// assert!(is_valid("db-settings.v2"));
/// assert!(is_valid("app_name:v1"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Require a non-empty identifier made only of allowed characters.
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ConfregError::validation(format!("{} must not be empty", kind)));
    }
    if !is_valid(value) {
        return Err(ConfregError::validation(format!(
            "{} '{}' contains illegal characters",
            kind, value
        )));
    }
    Ok(())
}

/// Parse a path version segment into an unsigned version number.
pub fn parse_version(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfregError::validation(format!("invalid version '{}'", raw)))
}

/// Parse a `k=v,k2=v2` label filter.
///
/// Every pair needs exactly one `=` and a non-empty key. Values may be empty.
/// A key repeated in the same filter is rejected rather than silently
/// overwritten.
pub fn parse_label_filter(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut filter = BTreeMap::new();
    if raw.is_empty() {
        return Ok(filter);
    }

    for pair in raw.split(FILTER_PAIR_SEPARATOR) {
        let (key, value) = pair.split_once(FILTER_KV_SEPARATOR).ok_or_else(|| {
            ConfregError::validation(format!("label filter pair '{}' has no '='", pair))
        })?;

        if key.is_empty() {
            return Err(ConfregError::validation(format!(
                "label filter pair '{}' has an empty key",
                pair
            )));
        }
        if value.contains(FILTER_KV_SEPARATOR) {
            return Err(ConfregError::validation(format!(
                "label filter pair '{}' has more than one '='",
                pair
            )));
        }
        if filter.insert(key.to_string(), value.to_string()).is_some() {
            return Err(ConfregError::validation(format!(
                "label filter repeats key '{}'",
                key
            )));
        }
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_alphanumeric() {
        assert!(is_valid("abc123"));
        assert!(is_valid("test_value"));
        assert!(is_valid("test-value"));
        assert!(is_valid("test.value"));
        assert!(is_valid("test:value"));
    }

    #[test]
    fn test_is_valid_invalid_chars() {
        assert!(!is_valid("test value"));
        assert!(!is_valid("test/value"));
        assert!(!is_valid("test@value"));
        assert!(!is_valid("test#value"));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("name", "db").is_ok());
        assert!(matches!(
            validate_identifier("name", ""),
            Err(ConfregError::ValidationError(_))
        ));
        assert!(matches!(
            validate_identifier("name", "a/b"),
            Err(ConfregError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("7").unwrap(), 7);
        assert_eq!(parse_version("0").unwrap(), 0);
        assert!(parse_version("-1").is_err());
        assert!(parse_version("v1").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn test_parse_label_filter() {
        let filter = parse_label_filter("env=prod,tier=db").unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(filter.get("env").map(String::as_str), Some("prod"));
        assert_eq!(filter.get("tier").map(String::as_str), Some("db"));

        let filter = parse_label_filter("env=").unwrap();
        assert_eq!(filter.get("env").map(String::as_str), Some(""));

        assert!(parse_label_filter("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_label_filter_rejects_malformed() {
        assert!(parse_label_filter("env").is_err());
        assert!(parse_label_filter("=prod").is_err());
        assert!(parse_label_filter("env=prod,").is_err());
        assert!(parse_label_filter("env=a=b").is_err());
        assert!(parse_label_filter("env=prod,env=dev").is_err());
    }

    mod prop {
        use proptest::prelude::*;

        use super::super::*;

        proptest! {
            #[test]
            fn label_filter_roundtrips_through_text(
                labels in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6)
            ) {
                let text = labels
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(",");
                prop_assert_eq!(parse_label_filter(&text).unwrap(), labels);
            }
        }
    }
}
