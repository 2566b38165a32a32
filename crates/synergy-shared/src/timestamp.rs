//! Conversion between local date values and the store's native timestamps.
//!
//! Locally a timestamp is a `DateTime<Utc>`, which serde renders as an
//! RFC 3339 string. The document store keeps timestamps as
//! `{"seconds": i64, "nanos": u32}` objects. [`encode_fields`] runs on the
//! write path and [`decode_fields`] on the read path; both take the field
//! paths declared by [`crate::models::Document`].
//!
//! Decoding never fails on a missing or unreadable value: required fields
//! fall back to "now", optional ones become null.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SynergyError};

/// Store-native timestamp: seconds since the Unix epoch plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl StoreTimestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }

    pub fn to_value(self) -> Value {
        serde_json::json!({ "seconds": self.seconds, "nanos": self.nanos })
    }

    /// Read a native timestamp object. Anything else yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let seconds = obj.get("seconds")?.as_i64()?;
        let nanos = obj.get("nanos").and_then(Value::as_u64).unwrap_or(0);
        Some(Self {
            seconds,
            nanos: u32::try_from(nanos).ok()?,
        })
    }

    /// The timestamp immediately after `self`.
    pub fn successor(self) -> Self {
        if self.nanos >= 999_999_999 {
            Self {
                seconds: self.seconds + 1,
                nanos: 0,
            }
        } else {
            Self {
                seconds: self.seconds,
                nanos: self.nanos + 1,
            }
        }
    }
}

/// Render a date the way serde renders `DateTime<Utc>`, keeping full
/// nanosecond precision.
pub fn to_local_value(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Interpret a value as a date, accepting both the native and the local
/// representation.
pub fn parse_any(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(ts) = StoreTimestamp::from_value(value) {
        return ts.to_datetime();
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert every local timestamp at `paths` into the native representation.
///
/// Missing and null fields are left alone. A string that is not RFC 3339 is
/// rejected rather than written.
pub fn encode_fields(doc: &mut Map<String, Value>, paths: &[&str]) -> Result<()> {
    let mut failure = None;
    for path in paths {
        visit(doc, path, &mut |obj: &mut Map<String, Value>, key: &str| {
            let Some(current) = obj.get(key) else {
                return;
            };
            if current.is_null() || StoreTimestamp::from_value(current).is_some() {
                return;
            }
            match parse_any(current) {
                Some(dt) => {
                    obj.insert(key.to_string(), StoreTimestamp::from_datetime(dt).to_value());
                }
                None => {
                    failure.get_or_insert_with(|| {
                        SynergyError::Serialization(format!(
                            "field {key} is not a timestamp: {current}"
                        ))
                    });
                }
            }
        });
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Convert every native timestamp at the given paths back to a local value.
pub fn decode_fields(
    doc: &mut Map<String, Value>,
    required: &[&str],
    optional: &[&str],
    now: DateTime<Utc>,
) {
    for (paths, is_required) in [(required, true), (optional, false)] {
        for path in paths {
            visit(doc, path, &mut |obj: &mut Map<String, Value>, key: &str| {
                let parsed = obj.get(key).and_then(parse_any);
                let value = match (parsed, is_required) {
                    (Some(dt), _) => to_local_value(dt),
                    (None, true) => {
                        if obj.get(key).is_some_and(|v| !v.is_null()) {
                            tracing::warn!(field = key, "unreadable timestamp, defaulting to now");
                        }
                        to_local_value(now)
                    }
                    (None, false) => Value::Null,
                };
                obj.insert(key.to_string(), value);
            });
        }
    }
}

/// Walk `path` inside `obj` and call `f` with the object that holds the
/// final key.
fn visit(obj: &mut Map<String, Value>, path: &str, f: &mut dyn FnMut(&mut Map<String, Value>, &str)) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let Some(rest) = rest else {
        f(obj, head);
        return;
    };

    if let Some(key) = head.strip_suffix("[]") {
        if let Some(Value::Array(items)) = obj.get_mut(key) {
            for item in items.iter_mut() {
                if let Value::Object(child) = item {
                    visit(child, rest, f);
                }
            }
        }
    } else if let Some(Value::Object(child)) = obj.get_mut(head) {
        visit(child, rest, f);
    }
}
