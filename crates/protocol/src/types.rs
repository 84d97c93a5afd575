use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal outcome requested on a segment, echoed back on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreResult {
    Store,
    Cancel,
}

impl StoreResult {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreResult::Store => "store",
            StoreResult::Cancel => "cancel",
        }
    }
}

impl fmt::Display for StoreResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Integer field that may arrive as a JSON number or a decimal string.
///
/// Message-bus clients historically sent `segment_number` and `size` as
/// strings, so both encodings are accepted. Conversion is deferred to
/// [`WireInt::parse`] so a malformed value can be reported with the right
/// error kind by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Number(i64),
    Text(String),
}

impl WireInt {
    /// Returns the integer value, or `None` if the text is not a decimal integer.
    pub fn parse(&self) -> Option<i64> {
        match self {
            WireInt::Number(n) => Some(*n),
            WireInt::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<i64> for WireInt {
    fn from(v: i64) -> Self {
        WireInt::Number(v)
    }
}

impl From<u64> for WireInt {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(n) => WireInt::Number(n),
            Err(_) => WireInt::Text(v.to_string()),
        }
    }
}

impl fmt::Display for WireInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireInt::Number(n) => write!(f, "{n}"),
            WireInt::Text(s) => f.write_str(s),
        }
    }
}
