//! Scalar field variants: text, numbers, booleans, choices and dates.

use crate::core::StorageType;
use crate::field::base::{Field, FieldBase, FieldKind};
use crate::field::payload::{ChoiceConfig, FieldPayload, LengthBounds, OptionList, TemporalConfig};

/// Declares a payload-free variant with its construction defaults.
macro_rules! plain_kind {
    ($(#[$meta:meta])* $kind:ident, $storage:ident, $input:literal, |$base:ident| $init:block) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $kind;

        impl FieldKind for $kind {
            const STORAGE_TYPE: StorageType = StorageType::$storage;
            const INPUT_TYPE: &'static str = $input;

            fn init($base: &mut FieldBase) $init
        }
    };
}

plain_kind!(
    /// Email address input.
    Email, Text, "email", |base| {
        base.push_rule("email");
    }
);

plain_kind!(
    /// Phone number in E.164 form.
    Tel, Text, "tel", |base| {
        base.push_rule("string");
        base.push_rule(r"regex:/^\+?[1-9]\d{1,14}$/");
    }
);

plain_kind!(
    Password, Text, "password", |base| {
        base.push_rule("string");
        base.hidden_on = vec!["view".to_string()];
    }
);

plain_kind!(
    /// Rich text stored as a JSON document.
    Wysiwyg, Json, "wysiwyg", |_base| {}
);

plain_kind!(
    Int, Int, "number", |base| {
        base.push_rule("numeric");
    }
);

plain_kind!(
    Float, Float, "number", |base| {
        base.push_rule("numeric");
    }
);

/// Variants carrying character length bounds.
pub trait LengthLimited {
    fn bounds_mut(&mut self) -> &mut LengthBounds;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    bounds: LengthBounds,
}

impl Default for Text {
    fn default() -> Self {
        Self {
            bounds: LengthBounds {
                min: None,
                max: Some(255),
            },
        }
    }
}

impl FieldKind for Text {
    const STORAGE_TYPE: StorageType = StorageType::Text;
    const INPUT_TYPE: &'static str = "text";

    fn init(base: &mut FieldBase) {
        base.push_rule("string");
        base.push_rule("max:255");
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Text(self.bounds.clone())
    }
}

impl LengthLimited for Text {
    fn bounds_mut(&mut self) -> &mut LengthBounds {
        &mut self.bounds
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextArea {
    bounds: LengthBounds,
}

impl Default for TextArea {
    fn default() -> Self {
        Self {
            bounds: LengthBounds {
                min: None,
                max: Some(255),
            },
        }
    }
}

impl FieldKind for TextArea {
    const STORAGE_TYPE: StorageType = StorageType::Text;
    const INPUT_TYPE: &'static str = "textarea";

    fn init(base: &mut FieldBase) {
        base.push_rule("string");
        base.push_rule("max:255");
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Text(self.bounds.clone())
    }
}

impl LengthLimited for TextArea {
    fn bounds_mut(&mut self) -> &mut LengthBounds {
        &mut self.bounds
    }
}

impl<K: FieldKind + LengthLimited> Field<K> {
    /// Replace any previous `max:` token.
    pub fn max_length(mut self, length: usize) -> Self {
        self.base.strip_rules("max:");
        self.base.push_rule(format!("max:{length}"));
        self.kind.bounds_mut().max = Some(length);
        self
    }

    /// Replace any previous `min:` token.
    pub fn min_length(mut self, length: usize) -> Self {
        self.base.strip_rules("min:");
        self.base.push_rule(format!("min:{length}"));
        self.kind.bounds_mut().min = Some(length);
        self
    }
}

/// Confirmation input that must repeat another field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordConfirm {
    match_field: Option<String>,
}

impl FieldKind for PasswordConfirm {
    const STORAGE_TYPE: StorageType = StorageType::Text;
    const INPUT_TYPE: &'static str = "password-confirmation";

    fn init(base: &mut FieldBase) {
        base.fillable = false;
        base.hidden_on = vec!["view".to_string()];
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Confirmation {
            match_field: self.match_field.clone(),
        }
    }
}

impl Field<PasswordConfirm> {
    /// Require this input whenever `field` is present and make them equal.
    pub fn match_field(mut self, field: &str) -> Self {
        self.base.required = true;
        self.base.required_rule = format!("required_with:{field}");
        self.base.strip_rules("same:");
        self.base.push_rule(format!("same:{field}"));
        self.kind.match_field = Some(field.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bool {
    styling_format: Option<String>,
}

impl FieldKind for Bool {
    const STORAGE_TYPE: StorageType = StorageType::Bool;
    const INPUT_TYPE: &'static str = "boolean";

    fn init(base: &mut FieldBase) {
        base.push_rule("boolean");
        base.show_label = false;
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Toggle {
            styling_format: self.styling_format.clone(),
        }
    }
}

impl Field<Bool> {
    /// Rendering hint, e.g. `checkbox` or `switch`.
    pub fn styling_format(mut self, format: &str) -> Self {
        self.kind.styling_format = Some(format.to_string());
        self
    }
}

/// Variants choosing from a fixed option list.
pub trait Choosable {
    fn choice_mut(&mut self) -> &mut ChoiceConfig;
}

macro_rules! choice_kind {
    ($(#[$meta:meta])* $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $kind {
            choice: ChoiceConfig,
        }

        impl Choosable for $kind {
            fn choice_mut(&mut self) -> &mut ChoiceConfig {
                &mut self.choice
            }
        }
    };
}

choice_kind!(Select);
choice_kind!(Radio);
choice_kind!(
    /// Multi-valued choice; each selected value is validated.
    Checkbox
);

impl FieldKind for Select {
    const STORAGE_TYPE: StorageType = StorageType::Enum;
    const INPUT_TYPE: &'static str = "select";

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Choice(self.choice.clone())
    }
}

impl FieldKind for Radio {
    const STORAGE_TYPE: StorageType = StorageType::Enum;
    const INPUT_TYPE: &'static str = "radio";

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Choice(self.choice.clone())
    }
}

impl FieldKind for Checkbox {
    const STORAGE_TYPE: StorageType = StorageType::Enum;
    const INPUT_TYPE: &'static str = "checkbox";

    fn validation_key_for(name: &str) -> String {
        format!("{name}.*")
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Choice(self.choice.clone())
    }
}

impl<K: FieldKind + Choosable> Field<K> {
    /// Set the option list; replaces earlier options and their `in:` rule.
    pub fn options(mut self, options: impl Into<OptionList>) -> Self {
        let options = options.into();
        let keys = options.keys().collect::<Vec<_>>().join(",");
        self.base.strip_rules("in:");
        self.base.push_rule(format!("in:{keys}"));
        self.kind.choice_mut().options = Some(options);
        self
    }

    pub fn styling_format(mut self, format: &str) -> Self {
        self.kind.choice_mut().styling_format = Some(format.to_string());
        self
    }
}

/// Variants carrying a timezone and date bounds.
pub trait Temporal {
    fn temporal_mut(&mut self) -> &mut TemporalConfig;
}

macro_rules! temporal_kind {
    ($kind:ident, $storage:ident, $input:literal, $rule:literal) => {
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $kind {
            temporal: TemporalConfig,
        }

        impl FieldKind for $kind {
            const STORAGE_TYPE: StorageType = StorageType::$storage;
            const INPUT_TYPE: &'static str = $input;

            fn init(base: &mut FieldBase) {
                base.push_rule($rule);
            }

            fn payload(&self, _base: &FieldBase) -> FieldPayload {
                FieldPayload::Temporal(self.temporal.clone())
            }
        }

        impl Temporal for $kind {
            fn temporal_mut(&mut self) -> &mut TemporalConfig {
                &mut self.temporal
            }
        }
    };
}

temporal_kind!(Date, Timestamp, "date", "date");
temporal_kind!(DateTime, Timestamp, "datetime", "date");
temporal_kind!(Time, Text, "time", "date_format:H:i:s");

impl<K: FieldKind + Temporal> Field<K> {
    /// Earliest accepted value; adds an `after_or_equal` rule.
    pub fn min_date(mut self, date: &str) -> Self {
        self.base.strip_rules("after_or_equal:");
        self.base.push_rule(format!("after_or_equal:{date}"));
        self.kind.temporal_mut().min = Some(date.to_string());
        self
    }

    /// Latest accepted value; adds a `before_or_equal` rule.
    pub fn max_date(mut self, date: &str) -> Self {
        self.base.strip_rules("before_or_equal:");
        self.base.push_rule(format!("before_or_equal:{date}"));
        self.kind.temporal_mut().max = Some(date.to_string());
        self
    }

    pub fn timezone(mut self, timezone: &str) -> Self {
        self.kind.temporal_mut().timezone = timezone.to_string();
        self
    }
}
