//! Rule string parsing.

use crate::core::{Result, SchemaError};

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Nullable,
    RequiredWith(Vec<String>),
    String,
    Numeric,
    Integer,
    Boolean,
    Array,
    Email,
    Date,
    DateFormat(String),
    In(Vec<String>),
    NotIn(Vec<String>),
    Min(f64),
    Max(f64),
    Regex(String),
    Same(String),
    After(String),
    AfterOrEqual(String),
    Before(String),
    BeforeOrEqual(String),
    /// Resolved against the validator's extensions at evaluation time.
    Custom { name: String, params: Vec<String> },
}

impl Rule {
    pub fn parse(token: &str) -> Result<Self> {
        let (name, raw_params) = match token.split_once(':') {
            Some((name, params)) => (name.trim(), Some(params)),
            None => (token.trim(), None),
        };
        let params = || -> Vec<String> {
            raw_params
                .map(|raw| raw.split(',').map(|p| p.trim().to_string()).collect())
                .unwrap_or_default()
        };
        let single = || -> Result<String> {
            raw_params
                .map(str::to_string)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| SchemaError::Precondition(format!("rule {name} requires a parameter")))
        };

        let rule = match name {
            "required" => Self::Required,
            "nullable" => Self::Nullable,
            "required_with" => Self::RequiredWith(params()),
            "string" => Self::String,
            "numeric" => Self::Numeric,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "email" => Self::Email,
            "date" => Self::Date,
            "date_format" => Self::DateFormat(single()?),
            "in" => Self::In(params()),
            "not_in" => Self::NotIn(params()),
            "min" => Self::Min(parse_bound(name, &single()?)?),
            "max" => Self::Max(parse_bound(name, &single()?)?),
            "regex" => Self::Regex(single()?),
            "same" => Self::Same(single()?),
            "after" => Self::After(single()?),
            "after_or_equal" => Self::AfterOrEqual(single()?),
            "before" => Self::Before(single()?),
            "before_or_equal" => Self::BeforeOrEqual(single()?),
            _ => Self::Custom {
                name: name.to_string(),
                params: params(),
            },
        };
        Ok(rule)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Nullable => "nullable",
            Self::RequiredWith(_) => "required_with",
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Email => "email",
            Self::Date => "date",
            Self::DateFormat(_) => "date_format",
            Self::In(_) => "in",
            Self::NotIn(_) => "not_in",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Regex(_) => "regex",
            Self::Same(_) => "same",
            Self::After(_) => "after",
            Self::AfterOrEqual(_) => "after_or_equal",
            Self::Before(_) => "before",
            Self::BeforeOrEqual(_) => "before_or_equal",
            Self::Custom { name, .. } => name,
        }
    }

    /// Implicit rules run even when the attribute is absent or blank.
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::Required | Self::RequiredWith(_))
    }
}

fn parse_bound(rule: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| SchemaError::Precondition(format!("rule {rule} expects a number, got '{raw}'")))
}

/// Split a `|`-joined rule string into tokens.
///
/// A `regex:` pattern may itself contain `|`; its token extends until the
/// closing delimiter (plus flags) is reached.
pub fn split_rule_string(rules: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending: Option<String> = None;

    for piece in rules.split('|') {
        if let Some(mut open) = pending.take() {
            open.push('|');
            open.push_str(piece);
            if regex_is_closed(&open) {
                tokens.push(open);
            } else {
                pending = Some(open);
            }
            continue;
        }

        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        if piece.starts_with("regex:") && !regex_is_closed(piece) {
            pending = Some(piece.to_string());
        } else {
            tokens.push(piece.to_string());
        }
    }

    if let Some(open) = pending {
        tokens.push(open);
    }
    tokens
}

fn regex_is_closed(token: &str) -> bool {
    let Some((_, pattern)) = token.split_once(':') else {
        return true;
    };
    let mut chars = pattern.chars();
    let Some(delimiter) = chars.next() else {
        return true;
    };

    let body = chars.as_str().trim_end_matches(|c: char| c.is_ascii_alphabetic());
    body.ends_with(delimiter) && !body.ends_with(&format!("\\{delimiter}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_regex_alternation() {
        assert_eq!(
            split_rule_string("required|regex:/^(a|b)$/i|max:3"),
            vec!["required", "regex:/^(a|b)$/i", "max:3"]
        );
        assert_eq!(
            split_rule_string("nullable|string|regex:/^\\+?[1-9]\\d{1,14}$/"),
            vec!["nullable", "string", "regex:/^\\+?[1-9]\\d{1,14}$/"]
        );
        assert_eq!(split_rule_string("nullable||email"), vec!["nullable", "email"]);
    }

    #[test]
    fn test_parse_parameters() {
        assert_eq!(
            Rule::parse("in:draft,live").unwrap(),
            Rule::In(vec!["draft".into(), "live".into()])
        );
        assert_eq!(Rule::parse("max:255").unwrap(), Rule::Max(255.0));
        assert_eq!(Rule::parse("date_format:H:i:s").unwrap(), Rule::DateFormat("H:i:s".into()));
        assert!(Rule::parse("max:lots").is_err());
        assert!(Rule::parse("same").is_err());
    }

    #[test]
    fn test_unknown_rules_are_custom() {
        let rule = Rule::parse("uppercase:strict").unwrap();
        assert_eq!(rule.name(), "uppercase");
        assert!(!rule.is_implicit());
        assert!(Rule::parse("required_with:password").unwrap().is_implicit());
    }
}
