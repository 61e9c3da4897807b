//! Dotted attribute paths with `*` wildcards.

use serde_json::Value;

/// Value at a dotted path; numeric segments index arrays.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Concrete paths matching `pattern` in `data`.
///
/// A pattern without wildcards is returned as-is, present or not. Each `*`
/// expands to the keys (or indices) found at that level; a wildcard pattern
/// reaching past the data matches nothing.
pub fn expand(data: &Value, pattern: &str) -> Vec<String> {
    if !pattern.contains('*') {
        return vec![pattern.to_string()];
    }

    let segments: Vec<&str> = pattern.split('.').collect();
    let mut paths = Vec::new();
    expand_into(data, &segments, String::new(), &mut paths);
    paths
}

fn expand_into(current: &Value, segments: &[&str], prefix: String, out: &mut Vec<String>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(prefix);
        return;
    };

    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };

    if *head != "*" {
        let next = match current {
            Value::Object(map) => map.get(*head),
            Value::Array(items) => head.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        if let Some(value) = next {
            expand_into(value, rest, join(head), out);
        }
        return;
    }

    match current {
        Value::Object(map) => {
            for (key, value) in map {
                expand_into(value, rest, join(key), out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                expand_into(value, rest, join(&index.to_string()), out);
            }
        }
        _ => {}
    }
}

/// Assign `value` at a dotted path, creating objects along the way.
///
/// Intermediate non-object values are replaced.
pub fn set(data: &mut Value, path: &str, value: Value) {
    let mut current = data;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map.entry(segment).or_insert(Value::Null);
    }
}

/// Human form of an attribute path used in messages.
pub fn display_name(path: &str) -> String {
    path.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_walks_objects_and_arrays() {
        let data = json!({"profile": {"emails": ["a@x.io", "b@x.io"]}});
        assert_eq!(lookup(&data, "profile.emails.1"), Some(&json!("b@x.io")));
        assert_eq!(lookup(&data, "profile.phone"), None);
    }

    #[test]
    fn test_wildcards_expand_to_present_entries() {
        let data = json!({"rows": [{"email": "a"}, {"email": "b"}], "tags": ["x"]});
        assert_eq!(expand(&data, "rows.*.email"), vec!["rows.0.email", "rows.1.email"]);
        assert_eq!(expand(&data, "tags.*"), vec!["tags.0"]);
        assert!(expand(&data, "missing.*").is_empty());
        assert_eq!(expand(&data, "title"), vec!["title"]);
    }

    #[test]
    fn test_set_builds_nested_objects() {
        let mut data = json!({"seo": "flat"});
        set(&mut data, "seo.title", json!("Home"));
        set(&mut data, "color", json!("red"));
        assert_eq!(data, json!({"seo": {"title": "Home"}, "color": "red"}));
    }
}
