use super::errors::ValidationErrors;
use super::path::{display_name, expand, lookup};
use super::rules::{Rule, split_rule_string};
use crate::core::dates::parse_datetime;
use crate::core::{Result, SchemaError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use lazy_static::lazy_static;
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use ::validator::ValidateEmail;

lazy_static! {
    static ref PATTERN_CACHE: Mutex<LruCache<String, Arc<Regex>>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(200).unwrap_or(NonZeroUsize::MIN)));
}

/// Custom rule: `(attribute, value, parameters, data) -> passes`.
pub type RuleCheck = Arc<dyn Fn(&str, &Value, &[String], &Value) -> bool + Send + Sync>;

#[derive(Clone)]
struct Extension {
    check: RuleCheck,
    message: String,
}

/// Evaluates rule strings against a JSON document.
///
/// Rules are keyed by dotted attribute paths, `*` matching every key or
/// index at its level. Non-implicit rules are skipped for absent or blank
/// values and for `null` when the attribute is `nullable`; once an implicit
/// rule fails, the attribute's remaining rules are skipped.
pub struct Validator {
    data: Value,
    rules: BTreeMap<String, Vec<String>>,
    extensions: HashMap<String, Extension>,
    errors: ValidationErrors,
    evaluated: bool,
}

impl Validator {
    pub fn make(data: Value, rules: &BTreeMap<String, String>) -> Self {
        let rules = rules
            .iter()
            .map(|(key, rule_string)| (key.clone(), split_rule_string(rule_string)))
            .collect();

        Self {
            data,
            rules,
            extensions: HashMap::new(),
            errors: ValidationErrors::new(),
            evaluated: false,
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        self.evaluated = false;
        &mut self.data
    }

    pub fn rules(&self) -> &BTreeMap<String, Vec<String>> {
        &self.rules
    }

    /// Append rule tokens to `key`.
    pub fn add_rules(&mut self, key: &str, rule_string: &str) -> &mut Self {
        self.rules
            .entry(key.to_string())
            .or_default()
            .extend(split_rule_string(rule_string));
        self.evaluated = false;
        self
    }

    pub fn remove_rules(&mut self, key: &str) -> &mut Self {
        self.rules.remove(key);
        self.evaluated = false;
        self
    }

    /// Register a custom rule. `:attribute` in `message` is replaced with the attribute name.
    pub fn extend<F>(&mut self, name: &str, message: &str, check: F) -> &mut Self
    where
        F: Fn(&str, &Value, &[String], &Value) -> bool + Send + Sync + 'static,
    {
        self.extensions.insert(
            name.to_string(),
            Extension {
                check: Arc::new(check),
                message: message.to_string(),
            },
        );
        self.evaluated = false;
        self
    }

    pub fn fails(&mut self) -> Result<bool> {
        self.evaluate()?;
        Ok(!self.errors.is_empty())
    }

    pub fn passes(&mut self) -> Result<bool> {
        Ok(!self.fails()?)
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Evaluate, failing with the collected messages.
    pub fn validate(mut self) -> Result<Value> {
        if self.fails()? {
            return Err(SchemaError::Validation(self.errors));
        }
        Ok(self.data)
    }

    fn evaluate(&mut self) -> Result<()> {
        if self.evaluated {
            return Ok(());
        }

        let mut errors = ValidationErrors::new();
        for (pattern, tokens) in &self.rules {
            let rules = tokens
                .iter()
                .map(|token| Rule::parse(token))
                .collect::<Result<Vec<_>>>()?;
            let nullable = rules.contains(&Rule::Nullable);

            for attribute in expand(&self.data, pattern) {
                let value = lookup(&self.data, &attribute);
                for rule in &rules {
                    if *rule == Rule::Nullable || !self.is_validatable(rule, value, nullable) {
                        continue;
                    }

                    if let Some(message) = self.check(&attribute, value, rule, &rules)? {
                        errors.add(attribute.clone(), message);
                        if rule.is_implicit() {
                            break;
                        }
                    }
                }
            }
        }

        self.errors = errors;
        self.evaluated = true;
        Ok(())
    }

    fn is_validatable(&self, rule: &Rule, value: Option<&Value>, nullable: bool) -> bool {
        if rule.is_implicit() {
            return true;
        }
        match value {
            None => false,
            Some(Value::Null) => !nullable,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Failure message for `rule`, or `None` when it passes.
    fn check(
        &self,
        attribute: &str,
        value: Option<&Value>,
        rule: &Rule,
        siblings: &[Rule],
    ) -> Result<Option<String>> {
        let name = display_name(attribute);
        let value_or_null = value.unwrap_or(&Value::Null);

        let failed = match rule {
            Rule::Required => !is_filled(value),
            Rule::Nullable => false,
            Rule::RequiredWith(others) => {
                let triggered = others.iter().any(|other| is_filled(lookup(&self.data, other)));
                if triggered && !is_filled(value) {
                    return Ok(Some(format!(
                        "The {name} field is required when {} is present.",
                        others.iter().map(|o| display_name(o)).collect::<Vec<_>>().join(" / ")
                    )));
                }
                false
            }
            Rule::String => !value_or_null.is_string(),
            Rule::Numeric => as_number(value_or_null).is_none(),
            Rule::Integer => !is_integer(value_or_null),
            Rule::Boolean => !is_boolean(value_or_null),
            Rule::Array => !(value_or_null.is_array() || value_or_null.is_object()),
            Rule::Email => !value_or_null.as_str().is_some_and(|s| s.validate_email()),
            Rule::Date => !value_or_null.as_str().is_some_and(|s| parse_datetime(s).is_some()),
            Rule::DateFormat(format) => {
                let matches = value_or_null
                    .as_str()
                    .is_some_and(|s| matches_date_format(s, format));
                if !matches {
                    return Ok(Some(format!("The {name} does not match the format {format}.")));
                }
                false
            }
            Rule::In(allowed) => !is_in(value_or_null, allowed),
            Rule::NotIn(denied) => match value_or_null {
                Value::Array(items) => items.iter().any(|item| scalar_text(item).is_some_and(|t| denied.contains(&t))),
                other => scalar_text(other).is_some_and(|t| denied.contains(&t)),
            },
            Rule::Min(bound) | Rule::Max(bound) => {
                let is_min = matches!(rule, Rule::Min(_));
                return Ok(size_violation(&name, value_or_null, *bound, is_min, siblings));
            }
            Rule::Regex(pattern) => {
                let regex = compile_pattern(pattern)?;
                !scalar_text(value_or_null).is_some_and(|text| regex.is_match(&text))
            }
            Rule::Same(other) => {
                if lookup(&self.data, other) != value {
                    return Ok(Some(format!(
                        "The {name} and {} must match.",
                        display_name(other)
                    )));
                }
                false
            }
            Rule::After(bound)
            | Rule::AfterOrEqual(bound)
            | Rule::Before(bound)
            | Rule::BeforeOrEqual(bound) => {
                return Ok(self.date_comparison(&name, value_or_null, rule, bound));
            }
            Rule::Custom { name: rule_name, params } => {
                let extension = self.extensions.get(rule_name).ok_or_else(|| {
                    SchemaError::Precondition(format!("validation rule {rule_name} is not defined"))
                })?;
                if (extension.check)(attribute, value_or_null, params, &self.data) {
                    return Ok(None);
                }
                return Ok(Some(extension.message.replace(":attribute", &name)));
            }
        };

        Ok(failed.then(|| standard_message(&name, rule)))
    }

    fn date_comparison(&self, name: &str, value: &Value, rule: &Rule, bound: &str) -> Option<String> {
        let Some(actual) = value.as_str().and_then(Moment::parse) else {
            return Some(standard_message(name, &Rule::Date));
        };

        // The bound is a date literal, or the name of another attribute.
        let limit = Moment::parse(bound).or_else(|| {
            lookup(&self.data, bound)
                .and_then(Value::as_str)
                .and_then(Moment::parse)
        })?;

        let ordering = actual.compare(&limit);
        let (passes, relation) = match rule {
            Rule::After(_) => (ordering.is_gt(), "after"),
            Rule::AfterOrEqual(_) => (ordering.is_ge(), "after or equal to"),
            Rule::Before(_) => (ordering.is_lt(), "before"),
            _ => (ordering.is_le(), "before or equal to"),
        };

        (!passes).then(|| format!("The {name} must be a date {relation} {bound}."))
    }
}

/// Operand of a date comparison. Bare times have no date part and compare by time of day.
#[derive(Debug, Clone, Copy)]
enum Moment {
    Instant(DateTime<Utc>),
    TimeOfDay(NaiveTime),
}

impl Moment {
    fn parse(raw: &str) -> Option<Self> {
        if let Some(instant) = parse_datetime(raw) {
            return Some(Self::Instant(instant));
        }
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
            .map(Self::TimeOfDay)
    }

    fn time(&self) -> NaiveTime {
        match self {
            Self::Instant(instant) => instant.time(),
            Self::TimeOfDay(time) => *time,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Instant(a), Self::Instant(b)) => a.cmp(b),
            _ => self.time().cmp(&other.time()),
        }
    }
}

fn standard_message(name: &str, rule: &Rule) -> String {
    match rule {
        Rule::Required => format!("The {name} field is required."),
        Rule::String => format!("The {name} must be a string."),
        Rule::Numeric => format!("The {name} must be a number."),
        Rule::Integer => format!("The {name} must be an integer."),
        Rule::Boolean => format!("The {name} field must be true or false."),
        Rule::Array => format!("The {name} must be an array."),
        Rule::Email => format!("The {name} must be a valid email address."),
        Rule::Date => format!("The {name} is not a valid date."),
        Rule::In(_) | Rule::NotIn(_) => format!("The selected {name} is invalid."),
        Rule::Regex(_) => format!("The {name} format is invalid."),
        _ => format!("The {name} is invalid."),
    }
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.as_i64().is_some_and(|i| i == 0 || i == 1),
        Value::String(s) => s == "0" || s == "1",
        _ => false,
    }
}

/// Text form of a scalar as compared by `in`/`not_in`/`regex`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn is_in(value: &Value, allowed: &[String]) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .all(|item| scalar_text(item).is_some_and(|t| allowed.contains(&t))),
        other => scalar_text(other).is_some_and(|t| allowed.contains(&t)),
    }
}

/// Sized comparison: numbers by value when a numeric rule is present,
/// arrays by length, everything else by character count.
fn size_violation(name: &str, value: &Value, bound: f64, is_min: bool, siblings: &[Rule]) -> Option<String> {
    let numeric = siblings
        .iter()
        .any(|rule| matches!(rule, Rule::Numeric | Rule::Integer));

    let (size, unit) = match value {
        Value::Array(items) => (items.len() as f64, Some("items")),
        Value::Object(map) => (map.len() as f64, Some("items")),
        other if numeric => (as_number(other)?, None),
        Value::Number(n) => (n.as_f64()?, None),
        Value::String(s) => (s.chars().count() as f64, Some("characters")),
        _ => return None,
    };

    let bound_text = if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    };

    if is_min && size < bound {
        return Some(match unit {
            Some("items") => format!("The {name} must have at least {bound_text} items."),
            Some(unit) => format!("The {name} must be at least {bound_text} {unit}."),
            None => format!("The {name} must be at least {bound_text}."),
        });
    }
    if !is_min && size > bound {
        return Some(match unit {
            Some("items") => format!("The {name} may not have more than {bound_text} items."),
            Some(unit) => format!("The {name} may not be greater than {bound_text} {unit}."),
            None => format!("The {name} may not be greater than {bound_text}."),
        });
    }
    None
}

/// Compile a delimited pattern such as `/^a+$/i`, reusing cached regexes.
fn compile_pattern(pattern: &str) -> Result<Arc<Regex>> {
    if let Some(cached) = PATTERN_CACHE.lock()?.get(pattern) {
        return Ok(Arc::clone(cached));
    }

    let invalid = || SchemaError::Precondition(format!("invalid regex rule '{pattern}'"));
    let mut chars = pattern.chars();
    let delimiter = chars.next().ok_or_else(invalid)?;
    let rest = chars.as_str();
    let end = rest.rfind(delimiter).ok_or_else(invalid)?;
    let (body, flags) = (&rest[..end], &rest[end + delimiter.len_utf8()..]);

    let regex = RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|err| SchemaError::Precondition(format!("invalid regex rule '{pattern}': {err}")))?;

    let regex = Arc::new(regex);
    PATTERN_CACHE.lock()?.put(pattern.to_string(), Arc::clone(&regex));
    Ok(regex)
}

/// Translate the date-format tokens in use (`Y m d H i s` and friends) to chrono.
fn chrono_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    for c in format.chars() {
        match c {
            'Y' => out.push_str("%Y"),
            'y' => out.push_str("%y"),
            'm' | 'n' => out.push_str("%m"),
            'd' | 'j' => out.push_str("%d"),
            'H' | 'G' => out.push_str("%H"),
            'h' | 'g' => out.push_str("%I"),
            'i' => out.push_str("%M"),
            's' => out.push_str("%S"),
            'A' | 'a' => out.push_str("%p"),
            'P' => out.push_str("%:z"),
            'O' => out.push_str("%z"),
            '%' => out.push_str("%%"),
            other => out.push(other),
        }
    }
    out
}

fn matches_date_format(value: &str, format: &str) -> bool {
    let format = chrono_format(format);
    NaiveDateTime::parse_from_str(value, &format).is_ok()
        || NaiveDate::parse_from_str(value, &format).is_ok()
        || NaiveTime::parse_from_str(value, &format).is_ok()
}
