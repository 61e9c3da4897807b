//! File operations sent for a media field.
//!
//! Each entry is either `{"add": true, "base64": ..., "name": ...}`,
//! `{"add": true, "tusKey": ...}` or `{"remove": true, "id": ...}`. Entries
//! flagged as neither are ignored.

use crate::store::RecordId;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Base64(String),
    Upload(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Add { source: FileSource, name: Option<String> },
    Remove { id: RecordId },
}

impl FileOperation {
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireOperation {
    add: bool,
    remove: bool,
    base64: Option<String>,
    #[serde(rename = "tusKey", alias = "upload_key")]
    upload_key: Option<String>,
    name: Option<String>,
    id: Option<Value>,
}

/// Outcome of reading one entry of the operation list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOperation {
    Valid(FileOperation),
    Invalid { index: usize, reason: String },
}

/// Read the operation list of a media field.
///
/// Malformed entries are reported individually so the caller can skip them.
pub fn parse_operations(value: &Value) -> Vec<ParsedOperation> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| parse_entry(entry).map_err(|reason| (index, reason)).transpose())
        .map(|result| match result {
            Ok(op) => ParsedOperation::Valid(op),
            Err((index, reason)) => ParsedOperation::Invalid { index, reason },
        })
        .collect()
}

fn parse_entry(entry: &Value) -> Result<Option<FileOperation>, String> {
    let wire: WireOperation = serde_json::from_value(entry.clone()).map_err(|err| err.to_string())?;

    if wire.add {
        let source = match (wire.upload_key.filter(|key| !key.is_empty()), wire.base64) {
            (Some(key), _) => FileSource::Upload(key),
            (None, Some(data)) => FileSource::Base64(data),
            (None, None) => return Err("added file has neither base64 data nor an upload key".to_string()),
        };
        return Ok(Some(FileOperation::Add {
            source,
            name: wire.name.filter(|name| !name.is_empty()),
        }));
    }

    if wire.remove {
        let id = match &wire.id {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| "removed file has no valid id".to_string())?;
        return Ok(Some(FileOperation::Remove { id }));
    }

    Ok(None)
}

/// Removals first, then additions, each in request order.
pub fn removals_first(mut operations: Vec<FileOperation>) -> Vec<FileOperation> {
    operations.sort_by_key(|op| !op.is_removal());
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_entries_are_read() {
        let parsed = parse_operations(&json!([
            {"add": true, "base64": "aGk=", "name": "hi.txt"},
            {"add": true, "tusKey": "abc", "base64": "ignored"},
            {"remove": true, "id": "7"},
            {"noop": true},
            {"add": true},
            {"remove": true, "id": "x"}
        ]));

        assert_eq!(
            parsed[..3],
            [
                ParsedOperation::Valid(FileOperation::Add {
                    source: FileSource::Base64("aGk=".into()),
                    name: Some("hi.txt".into()),
                }),
                ParsedOperation::Valid(FileOperation::Add {
                    source: FileSource::Upload("abc".into()),
                    name: None,
                }),
                ParsedOperation::Valid(FileOperation::Remove { id: 7 }),
            ]
        );
        assert!(matches!(parsed[3], ParsedOperation::Invalid { index: 4, .. }));
        assert!(matches!(parsed[4], ParsedOperation::Invalid { index: 5, .. }));
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_non_arrays_carry_no_operations() {
        assert!(parse_operations(&json!({"add": true})).is_empty());
        assert!(parse_operations(&Value::Null).is_empty());
    }

    #[test]
    fn test_removals_are_ordered_before_additions() {
        let add = |n: &str| FileOperation::Add {
            source: FileSource::Base64(n.into()),
            name: None,
        };
        let ordered = removals_first(vec![add("a"), FileOperation::Remove { id: 1 }, add("b"), FileOperation::Remove { id: 2 }]);
        assert_eq!(
            ordered,
            vec![
                FileOperation::Remove { id: 1 },
                FileOperation::Remove { id: 2 },
                add("a"),
                add("b")
            ]
        );
    }
}
