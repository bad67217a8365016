//! SigMF metadata tree: global info, captures and annotations.
//!
//! Known `core:` keys are typed fields; everything else is kept verbatim in a
//! sorted extension map so that equality and serialization ignore key order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::datatype::DataType;
use crate::util::{Error, Result};

/// Free-form extension fields, sorted by key.
pub type Fields = BTreeMap<String, Value>;

/// Version of the SigMF specification written by this crate.
pub const SIGMF_VERSION: &str = "1.0.0";

// === Metadata keys ===

pub const GLOBAL_KEY: &str = "global";
pub const CAPTURE_KEY: &str = "captures";
pub const ANNOTATION_KEY: &str = "annotations";
pub const DATATYPE_KEY: &str = "core:datatype";
pub const SAMPLE_RATE_KEY: &str = "core:sample_rate";
pub const NUM_CHANNELS_KEY: &str = "core:num_channels";
pub const VERSION_KEY: &str = "core:version";
pub const HASH_KEY: &str = "core:sha512";
pub const TRAILING_BYTES_KEY: &str = "core:trailing_bytes";
pub const START_INDEX_KEY: &str = "core:sample_start";
pub const LENGTH_INDEX_KEY: &str = "core:sample_count";
pub const HEADER_BYTES_KEY: &str = "core:header_bytes";

/// Global section of a recording.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfo {
    #[serde(rename = "core:datatype", default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,

    /// Kept as written: `48000` and `48000.0` serialize differently.
    #[serde(rename = "core:sample_rate", default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<Number>,

    #[serde(rename = "core:num_channels", default, skip_serializing_if = "Option::is_none")]
    pub num_channels: Option<u64>,

    #[serde(rename = "core:version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(rename = "core:sha512", default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,

    #[serde(rename = "core:trailing_bytes", default, skip_serializing_if = "Option::is_none")]
    pub trailing_bytes: Option<u64>,

    #[serde(flatten)]
    pub extra: Fields,
}

impl GlobalInfo {
    /// Global section for a freshly created recording.
    pub fn new() -> Self {
        Self {
            version: Some(SIGMF_VERSION.to_string()),
            num_channels: Some(1),
            ..Self::default()
        }
    }

    /// Parsed datatype.
    pub fn data_type(&self) -> Result<DataType> {
        match &self.datatype {
            Some(s) => DataType::parse(s),
            None => Err(Error::InvalidDatatype(format!("missing {DATATYPE_KEY}"))),
        }
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate.as_ref().and_then(Number::as_f64)
    }

    /// Channel count, defaulting to 1.
    #[inline]
    pub fn num_channels(&self) -> u64 {
        self.num_channels.unwrap_or(1)
    }

    /// Trailing padding in bytes, defaulting to 0.
    #[inline]
    pub fn trailing_bytes(&self) -> u64 {
        self.trailing_bytes.unwrap_or(0)
    }

    /// Get any global field by key, typed keys included.
    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Set any global field by key, typed keys included.
    ///
    /// Values of the wrong type for a `core:` key are rejected.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let mut map = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        map.insert(key.into(), value);
        *self = serde_json::from_value(Value::Object(map))?;
        Ok(())
    }
}

/// One capture segment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    #[serde(rename = "core:header_bytes", default, skip_serializing_if = "Option::is_none")]
    pub header_bytes: Option<u64>,

    #[serde(flatten)]
    pub extra: Fields,
}

impl Capture {
    pub fn new(sample_start: u64) -> Self {
        Self { sample_start, ..Self::default() }
    }

    pub fn with_header_bytes(sample_start: u64, header_bytes: u64) -> Self {
        Self {
            sample_start,
            header_bytes: Some(header_bytes),
            ..Self::default()
        }
    }

    /// Header padding preceding this capture, defaulting to 0.
    #[inline]
    pub fn header_bytes(&self) -> u64 {
        self.header_bytes.unwrap_or(0)
    }
}

/// One annotation over a sample range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "core:sample_start")]
    pub sample_start: u64,

    /// Missing or zero means "until the end of the recording".
    #[serde(rename = "core:sample_count", default, skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<u64>,

    #[serde(flatten)]
    pub extra: Fields,
}

impl Annotation {
    pub fn new(sample_start: u64, sample_count: Option<u64>) -> Self {
        Self { sample_start, sample_count, ..Self::default() }
    }

    /// True if `index` falls inside this annotation.
    pub fn covers(&self, index: u64) -> bool {
        if index < self.sample_start {
            return false;
        }
        match self.sample_count {
            Some(0) | None => true,
            Some(count) => index - self.sample_start < count,
        }
    }

    /// One past the last annotated sample, if bounded.
    pub fn end(&self) -> Option<u64> {
        match self.sample_count {
            Some(0) | None => None,
            Some(count) => Some(self.sample_start.saturating_add(count)),
        }
    }
}

/// Full metadata tree of one recording.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "global", default)]
    pub global: GlobalInfo,

    #[serde(rename = "captures", default)]
    pub captures: Vec<Capture>,

    #[serde(rename = "annotations", default)]
    pub annotations: Vec<Annotation>,
}

impl Metadata {
    /// Metadata for a freshly created recording.
    pub fn new() -> Self {
        Self {
            global: GlobalInfo::new(),
            ..Self::default()
        }
    }

    /// Parse metadata from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Metadata as a generic JSON tree (object keys sorted).
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Insert a capture, keeping captures sorted by start.
    ///
    /// A capture already present at the same start absorbs the new fields.
    pub fn add_capture(&mut self, sample_start: u64, fields: Fields) {
        if let Some(existing) = self.captures.iter_mut().find(|c| c.sample_start == sample_start) {
            merge_capture_fields(existing, fields);
            return;
        }
        let mut capture = Capture::new(sample_start);
        merge_capture_fields(&mut capture, fields);
        let pos = self.captures.partition_point(|c| c.sample_start <= sample_start);
        self.captures.insert(pos, capture);
    }

    /// Insert an annotation after any with the same or earlier start.
    pub fn add_annotation(&mut self, sample_start: u64, sample_count: Option<u64>, fields: Fields) {
        let annotation = Annotation {
            sample_start,
            sample_count,
            extra: fields,
        };
        let pos = self.annotations.partition_point(|a| a.sample_start <= sample_start);
        self.annotations.insert(pos, annotation);
    }

    /// Largest bounded annotation end, or 0.
    pub fn annotation_extent(&self) -> u64 {
        self.annotations.iter().filter_map(Annotation::end).max().unwrap_or(0)
    }
}

fn merge_capture_fields(capture: &mut Capture, fields: Fields) {
    for (key, value) in fields {
        if key == HEADER_BYTES_KEY {
            if let Some(n) = value.as_u64() {
                capture.header_bytes = Some(n);
                continue;
            }
        }
        if key == START_INDEX_KEY {
            continue;
        }
        capture.extra.insert(key, value);
    }
}
