//! Canonical text form of metadata and collection trees.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::util::Result;

/// Turns a metadata tree into the bytes stored on disk.
///
/// Implementations must be deterministic: equal trees give equal bytes.
pub trait TextSerializer: Send + Sync {
    fn serialize(&self, tree: &Value) -> Result<Vec<u8>>;
}

/// Sorted keys, 4-space indentation, trailing newline.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalJson;

impl TextSerializer for CanonicalJson {
    fn serialize(&self, tree: &Value) -> Result<Vec<u8>> {
        // serde_json::Map is a BTreeMap without the preserve_order feature,
        // so object keys come out sorted.
        let mut out = Vec::with_capacity(1024);
        let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        tree.serialize(&mut ser)?;
        out.push(b'\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_layout() {
        let text = CanonicalJson.serialize(&json!({"b": 1, "a": [true]})).unwrap();
        assert_eq!(
            String::from_utf8(text).unwrap(),
            "{\n    \"a\": [\n        true\n    ],\n    \"b\": 1\n}\n"
        );
    }

    #[test]
    fn test_key_order_insignificant() {
        let a: Value = serde_json::from_str(r#"{"x": {"q": 1, "p": 2}, "w": null}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"w": null, "x": {"p": 2, "q": 1}}"#).unwrap();
        assert_eq!(CanonicalJson.serialize(&a).unwrap(), CanonicalJson.serialize(&b).unwrap());
    }
}
