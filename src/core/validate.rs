//! Structural metadata validation.
//!
//! The validator works on the generic JSON tree rather than the typed
//! [`Metadata`](super::Metadata) so that hand-edited or foreign metadata is
//! checked the same way as metadata produced by this crate.

use serde_json::{Map, Value};

use super::datatype::DataType;
use super::metadata::{
    ANNOTATION_KEY, CAPTURE_KEY, DATATYPE_KEY, GLOBAL_KEY, HASH_KEY, HEADER_BYTES_KEY, LENGTH_INDEX_KEY,
    NUM_CHANNELS_KEY, SAMPLE_RATE_KEY, START_INDEX_KEY, TRAILING_BYTES_KEY, VERSION_KEY,
};

/// Checks a metadata tree and explains the first problem found.
pub trait MetadataValidator: Send + Sync {
    fn validate(&self, tree: &Value) -> std::result::Result<(), String>;
}

/// Built-in validator for the `core` namespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaValidator;

type Check = std::result::Result<(), String>;

fn section<'a>(root: &'a Map<String, Value>, key: &str) -> std::result::Result<&'a Value, String> {
    root.get(key).ok_or_else(|| format!("missing '{key}' section"))
}

fn optional_u64(obj: &Map<String, Value>, key: &str, at: &str) -> std::result::Result<Option<u64>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("{at}: '{key}' must be a non-negative integer, got {v}")),
    }
}

fn required_u64(obj: &Map<String, Value>, key: &str, at: &str) -> std::result::Result<u64, String> {
    optional_u64(obj, key, at)?.ok_or_else(|| format!("{at}: missing '{key}'"))
}

fn check_global(global: &Value) -> Check {
    let obj = global
        .as_object()
        .ok_or_else(|| format!("'{GLOBAL_KEY}' must be an object"))?;

    match obj.get(DATATYPE_KEY) {
        Some(Value::String(s)) => {
            DataType::parse(s).map_err(|e| format!("{GLOBAL_KEY}: {e}"))?;
        }
        Some(v) => return Err(format!("{GLOBAL_KEY}: '{DATATYPE_KEY}' must be a string, got {v}")),
        None => return Err(format!("{GLOBAL_KEY}: missing '{DATATYPE_KEY}'")),
    }

    match obj.get(VERSION_KEY) {
        Some(Value::String(_)) => {}
        Some(v) => return Err(format!("{GLOBAL_KEY}: '{VERSION_KEY}' must be a string, got {v}")),
        None => return Err(format!("{GLOBAL_KEY}: missing '{VERSION_KEY}'")),
    }

    if let Some(n) = optional_u64(obj, NUM_CHANNELS_KEY, GLOBAL_KEY)? {
        if n == 0 {
            return Err(format!("{GLOBAL_KEY}: '{NUM_CHANNELS_KEY}' must be at least 1"));
        }
    }
    optional_u64(obj, TRAILING_BYTES_KEY, GLOBAL_KEY)?;

    if let Some(rate) = obj.get(SAMPLE_RATE_KEY) {
        match rate.as_f64() {
            Some(r) if r > 0.0 => {}
            _ => return Err(format!("{GLOBAL_KEY}: '{SAMPLE_RATE_KEY}' must be a positive number, got {rate}")),
        }
    }

    if let Some(hash) = obj.get(HASH_KEY) {
        let ok = hash
            .as_str()
            .is_some_and(|h| h.len() == 128 && h.bytes().all(|b| b.is_ascii_hexdigit()));
        if !ok {
            return Err(format!("{GLOBAL_KEY}: '{HASH_KEY}' must be a 128 digit hex string"));
        }
    }
    Ok(())
}

/// Checks an array of segments, each an object keyed by `core:sample_start`.
fn check_segments(value: &Value, name: &str, extra_key: &str) -> Check {
    let items = value.as_array().ok_or_else(|| format!("'{name}' must be an array"))?;
    let mut previous = 0u64;
    for (i, item) in items.iter().enumerate() {
        let at = format!("{name}[{i}]");
        let obj = item.as_object().ok_or_else(|| format!("{at} must be an object"))?;
        let start = required_u64(obj, START_INDEX_KEY, &at)?;
        optional_u64(obj, extra_key, &at)?;
        if start < previous {
            return Err(format!(
                "{at}: '{START_INDEX_KEY}' {start} is before the preceding entry ({previous})"
            ));
        }
        previous = start;
    }
    Ok(())
}

impl MetadataValidator for SchemaValidator {
    fn validate(&self, tree: &Value) -> Check {
        let root = tree.as_object().ok_or("metadata must be an object")?;
        check_global(section(root, GLOBAL_KEY)?)?;
        check_segments(section(root, CAPTURE_KEY)?, CAPTURE_KEY, HEADER_BYTES_KEY)?;
        check_segments(section(root, ANNOTATION_KEY)?, ANNOTATION_KEY, LENGTH_INDEX_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "global": {"core:datatype": "cf32_le", "core:version": "1.0.0", "core:num_channels": 1},
            "captures": [{"core:sample_start": 0}, {"core:sample_start": 10, "core:header_bytes": 4}],
            "annotations": [{"core:sample_start": 0, "core:sample_count": 5}, {"core:sample_start": 0}]
        })
    }

    #[test]
    fn test_accepts_valid_tree() {
        assert_eq!(SchemaValidator.validate(&valid()), Ok(()));
    }

    #[test]
    fn test_rejects_missing_sections() {
        let mut tree = valid();
        tree.as_object_mut().unwrap().remove("annotations");
        let err = SchemaValidator.validate(&tree).unwrap_err();
        assert!(err.contains("annotations"));
    }

    #[test]
    fn test_rejects_bad_global() {
        let mut tree = valid();
        tree["global"]["core:datatype"] = json!("xf32");
        assert!(SchemaValidator.validate(&tree).is_err());

        let mut tree = valid();
        tree["global"]["core:num_channels"] = json!(0);
        assert!(SchemaValidator.validate(&tree).is_err());

        let mut tree = valid();
        tree["global"]["core:sha512"] = json!("abc");
        assert!(SchemaValidator.validate(&tree).is_err());
    }

    #[test]
    fn test_rejects_unsorted_captures() {
        let mut tree = valid();
        tree["captures"] = json!([{"core:sample_start": 10}, {"core:sample_start": 0}]);
        let err = SchemaValidator.validate(&tree).unwrap_err();
        assert!(err.contains("captures[1]"));
    }

    #[test]
    fn test_rejects_negative_start() {
        let mut tree = valid();
        tree["annotations"] = json!([{"core:sample_start": -1}]);
        assert!(SchemaValidator.validate(&tree).is_err());
    }
}
