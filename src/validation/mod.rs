//! Rule-string validation.
//!
//! Field rule strings (`required|string|max:255`) are evaluated by
//! [`Validator`] against a JSON document, producing per-attribute messages.

mod errors;
pub mod path;
pub mod rules;
mod validator;

pub use errors::ValidationErrors;
pub use rules::{Rule, split_rule_string};
pub use self::validator::{RuleCheck, Validator};
