//! Structural access to loosely-typed payloads
//!
//! Every accessor fails with [`TimingError::Malformed`] tagged with the category
//! being decoded, so a shape violation anywhere in a payload surfaces as a single
//! fatal error naming the feed that changed.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::types::Category;
use crate::{Result, TimingError};

/// Metadata key SignalR mixes into keyed collections
const KEYFRAME_MARKER: &str = "_kf";

/// Payload accessor bound to the category being decoded
#[derive(Debug, Clone, Copy)]
pub(crate) struct Shape {
    category: Category,
}

impl Shape {
    pub(crate) fn of(category: Category) -> Self {
        Self { category }
    }

    pub(crate) fn malformed(&self, details: impl Into<String>) -> TimingError {
        TimingError::malformed(self.category.as_str(), details)
    }

    pub(crate) fn object<'a>(
        &self,
        value: &'a Value,
        what: &str,
    ) -> Result<&'a Map<String, Value>> {
        value.as_object().ok_or_else(|| self.malformed(format!("{what} is not an object: {value}")))
    }

    pub(crate) fn field<'a>(&self, object: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
        object.get(key).ok_or_else(|| self.malformed(format!("missing '{key}'")))
    }

    /// Deserialize a fixed-shape record
    pub(crate) fn record<T: DeserializeOwned>(&self, value: &Value, what: &str) -> Result<T> {
        T::deserialize(value).map_err(|e| self.malformed(format!("{what}: {e}")))
    }

    /// A non-negative integer sent either as a JSON number or a numeric string
    pub(crate) fn number(&self, value: &Value, what: &str) -> Result<u32> {
        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.malformed(format!("{what} is not a number: {value}")))
    }

    /// Like [`Shape::number`], but an empty string means "not set"
    pub(crate) fn optional_number(&self, value: &Value, what: &str) -> Result<Option<u32>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            other => self.number(other, what).map(Some),
        }
    }

    pub(crate) fn string<'a>(&self, value: &'a Value, what: &str) -> Result<&'a str> {
        value.as_str().ok_or_else(|| self.malformed(format!("{what} is not a string: {value}")))
    }

    pub(crate) fn boolean(&self, value: &Value, what: &str) -> Result<bool> {
        value.as_bool().ok_or_else(|| self.malformed(format!("{what} is not a boolean: {value}")))
    }

    /// Normalize a collection that arrives as an ordered list on full snapshots and
    /// as a mapping keyed by numeric strings on incremental updates.
    ///
    /// Returns `(index, entry)` pairs in ascending index order. Mapping keys are
    /// parsed and sorted; the `_kf` marker is skipped.
    pub(crate) fn indexed<'a>(
        &self,
        value: &'a Value,
        what: &str,
    ) -> Result<Vec<(usize, &'a Value)>> {
        match value {
            Value::Array(entries) => Ok(entries.iter().enumerate().collect()),
            Value::Object(entries) => {
                let mut indexed = Vec::with_capacity(entries.len());
                for (key, entry) in entries {
                    if key == KEYFRAME_MARKER {
                        continue;
                    }
                    let index = key
                        .parse::<usize>()
                        .map_err(|_| {
                            self.malformed(format!("{what} has non-numeric key '{key}'"))
                        })?;
                    indexed.push((index, entry));
                }
                indexed.sort_unstable_by_key(|(index, _)| *index);
                Ok(indexed)
            }
            other => {
                Err(self.malformed(format!("{what} is neither a list nor a mapping: {other}")))
            }
        }
    }

    /// Entries of a mapping keyed by driver number, in ascending driver order
    pub(crate) fn by_driver<'a>(
        &self,
        value: &'a Value,
        what: &str,
    ) -> Result<Vec<(u32, &'a Value)>> {
        let entries = self.object(value, what)?;
        let mut lines = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            if key == KEYFRAME_MARKER {
                continue;
            }
            let driver = key
                .parse::<u32>()
                .map_err(|_| self.malformed(format!("{what} has non-numeric driver '{key}'")))?;
            lines.push((driver, entry));
        }
        lines.sort_unstable_by_key(|(driver, _)| *driver);
        Ok(lines)
    }
}

/// Parse a feed time such as `"1:21.234"` or `"28.123"` into seconds.
/// Returns `None` for empty strings.
pub(crate) fn parse_seconds(shape: &Shape, value: &str, what: &str) -> Result<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let invalid = || shape.malformed(format!("{what} is not a time: '{value}'"));
    let mut total = 0.0;
    for part in value.split(':') {
        let part: f64 = part.parse().map_err(|_| invalid())?;
        total = total * 60.0 + part;
    }
    if !total.is_finite() || total < 0.0 {
        return Err(invalid());
    }
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape() -> Shape {
        Shape::of(Category::TimingData)
    }

    #[test]
    fn list_and_mapping_normalize_to_the_same_order() {
        let list = json!([{"Status": 1}, {"Status": 2}, {"Status": 3}]);
        let mapping = json!({"2": {"Status": 3}, "0": {"Status": 1}, "1": {"Status": 2}});

        let from_list = shape().indexed(&list, "Segments").unwrap();
        let from_mapping = shape().indexed(&mapping, "Segments").unwrap();
        assert_eq!(from_list, from_mapping);
    }

    #[test]
    fn mapping_keys_sort_numerically_not_lexically() {
        let mapping = json!({"10": "c", "9": "b", "_kf": true, "1": "a"});
        let indexed = shape().indexed(&mapping, "Messages").unwrap();
        let keys: Vec<usize> = indexed.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 9, 10]);
    }

    #[test]
    fn non_numeric_keys_are_malformed() {
        let err = shape().indexed(&json!({"abc": {}}), "Sectors").unwrap_err();
        assert!(matches!(err, TimingError::Malformed { .. }));
        assert!(shape().indexed(&json!("nope"), "Sectors").is_err());
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        assert_eq!(shape().number(&json!("12"), "Position").unwrap(), 12);
        assert_eq!(shape().number(&json!(12), "Position").unwrap(), 12);
        assert!(shape().number(&json!("P1"), "Position").is_err());
        assert_eq!(shape().optional_number(&json!(""), "GridPos").unwrap(), None);
    }

    #[test]
    fn parses_lap_and_sector_times() {
        assert_eq!(parse_seconds(&shape(), "1:21.500", "LastLapTime").unwrap(), Some(81.5));
        assert_eq!(parse_seconds(&shape(), "28.125", "Sector").unwrap(), Some(28.125));
        assert_eq!(parse_seconds(&shape(), "", "Sector").unwrap(), None);
        assert!(parse_seconds(&shape(), "fast", "Sector").is_err());
    }
}
