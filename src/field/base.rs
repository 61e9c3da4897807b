use crate::config::DEFAULT_FIELD_GROUP;
use crate::core::StorageType;
use crate::field::descriptor::FieldDescriptor;
use crate::field::payload::{ExtraData, FieldPayload, merge_json};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Configuration every field variant shares.
#[derive(Debug, Clone)]
pub struct FieldBase {
    pub(crate) name: Option<String>,
    pub(crate) label: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) placeholder: Option<String>,
    pub(crate) default_value: Value,
    pub(crate) required: bool,
    pub(crate) required_rule: String,
    pub(crate) validation_key: Option<String>,
    pub(crate) explicit_validation_key: bool,
    pub(crate) validation_rules: Vec<String>,
    pub(crate) show_label: bool,
    pub(crate) hidden: bool,
    pub(crate) input_hidden: bool,
    pub(crate) hidden_on: Vec<String>,
    pub(crate) fillable: bool,
    pub(crate) group: Option<String>,
    pub(crate) input_type: String,
    pub(crate) extra: Map<String, Value>,
    pub(crate) defect: Option<String>,
}

impl FieldBase {
    fn new(input_type: &str) -> Self {
        Self {
            name: None,
            label: None,
            description: None,
            placeholder: None,
            default_value: Value::Null,
            required: false,
            required_rule: "nullable".to_string(),
            validation_key: None,
            explicit_validation_key: false,
            validation_rules: Vec::new(),
            show_label: true,
            hidden: false,
            input_hidden: false,
            hidden_on: Vec::new(),
            fillable: true,
            group: None,
            input_type: input_type.to_string(),
            extra: Map::new(),
            defect: None,
        }
    }

    /// Drop every rule token starting with `prefix`.
    pub(crate) fn strip_rules(&mut self, prefix: &str) {
        self.validation_rules.retain(|rule| !rule.starts_with(prefix));
    }

    pub(crate) fn push_rule(&mut self, rule: impl Into<String>) {
        self.validation_rules.push(rule.into());
    }

    /// Record a configuration error; the first one wins.
    pub(crate) fn flag_defect(&mut self, message: impl Into<String>) {
        if self.defect.is_none() {
            self.defect = Some(message.into());
        }
    }

    pub(crate) fn rule_string(&self) -> String {
        std::iter::once(self.required_rule.as_str())
            .chain(self.validation_rules.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Variant marker for [`Field`]: fixes the storage type and owns the payload.
pub trait FieldKind: Clone + Default + Send + Sync + 'static {
    const STORAGE_TYPE: StorageType;
    const INPUT_TYPE: &'static str;

    /// Variant defaults applied at construction.
    fn init(_base: &mut FieldBase) {}

    fn validation_key_for(name: &str) -> String {
        name.to_string()
    }

    /// Group used when none is named and the builder knows it.
    fn preferred_group() -> Option<&'static str> {
        None
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::None
    }

    /// Rules of an owned sub-schema, already prefixed with `validation_key`.
    fn nested_rules(&self, _validation_key: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Object-safe view the builder consumes.
pub trait FieldSpec: Send + Sync {
    fn field_name(&self) -> Option<&str>;
    fn group_key(&self) -> Option<&str>;
    fn preferred_group(&self) -> Option<&'static str>;
    fn nested_rules(&self) -> BTreeMap<String, String>;
    fn defect(&self) -> Option<&str>;
    fn definition(&self) -> FieldDescriptor;
}

/// Fluent field builder, generic over its variant.
#[derive(Debug, Clone)]
pub struct Field<K: FieldKind> {
    pub(crate) base: FieldBase,
    pub(crate) kind: K,
}

impl<K: FieldKind> Default for Field<K> {
    fn default() -> Self {
        let mut base = FieldBase::new(K::INPUT_TYPE);
        K::init(&mut base);
        Self {
            base,
            kind: K::default(),
        }
    }
}

impl<K: FieldKind> Field<K> {
    pub fn new(name: &str) -> Self {
        Self::default().name(name)
    }

    /// Set the attribute name; also the validation key unless one was set explicitly.
    pub fn name(mut self, name: &str) -> Self {
        self.base.name = Some(name.to_string());
        if !self.base.explicit_validation_key {
            self.base.validation_key = Some(K::validation_key_for(name));
        }
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.base.label = Some(label.to_string());
        self
    }

    pub fn show_label(mut self, show: bool) -> Self {
        self.base.show_label = show;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.base.description = Some(description.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.base.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.base.default_value = value.into();
        self
    }

    /// Mark the field required (`required`) or optional (`nullable`).
    pub fn required(mut self, required: bool) -> Self {
        self.base.required = required;
        self.base.required_rule = if required { "required" } else { "nullable" }.to_string();
        self
    }

    /// Like [`required`](Self::required) with an explicit leading rule.
    pub fn required_with_rule(mut self, required: bool, rule: &str) -> Self {
        self.base.required = required;
        self.base.required_rule = rule.to_string();
        self
    }

    pub fn set_validation<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.validation_rules = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_validation(mut self, rule: &str) -> Self {
        self.base.push_rule(rule);
        self
    }

    pub fn validation_key(mut self, key: &str) -> Self {
        self.base.validation_key = Some(key.to_string());
        self.base.explicit_validation_key = true;
        self
    }

    pub fn fillable(mut self, fillable: bool) -> Self {
        self.base.fillable = fillable;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.base.hidden = hidden;
        self
    }

    /// Hide the input in forms without guarding the attribute.
    pub fn input_hidden(mut self, hidden: bool) -> Self {
        self.base.input_hidden = hidden;
        self
    }

    pub fn input_type(mut self, input_type: &str) -> Self {
        self.base.input_type = input_type.to_string();
        self
    }

    /// Deep-merge user extras into `extra_data`. Non-object values are ignored.
    pub fn add_extra_data(mut self, data: Value) -> Self {
        if let Value::Object(map) = data {
            merge_json(&mut self.base.extra, &map);
        }
        self
    }

    pub fn group(mut self, key: &str) -> Self {
        self.base.group = Some(key.to_string());
        self
    }

    pub fn hidden_on<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base.hidden_on = views.into_iter().map(Into::into).collect();
        self
    }

    /// `[required_rule, ...tokens]` joined with `|`.
    pub fn rule_string(&self) -> String {
        self.base.rule_string()
    }

    pub fn current_validation_key(&self) -> Option<&str> {
        self.base.validation_key.as_deref()
    }

    /// Explicit group, or the stock default group.
    pub fn current_group(&self) -> &str {
        self.base.group.as_deref().unwrap_or(DEFAULT_FIELD_GROUP)
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }
}

impl<K: FieldKind> FieldSpec for Field<K> {
    fn field_name(&self) -> Option<&str> {
        self.base.name.as_deref()
    }

    fn group_key(&self) -> Option<&str> {
        self.base.group.as_deref()
    }

    fn preferred_group(&self) -> Option<&'static str> {
        K::preferred_group()
    }

    fn nested_rules(&self) -> BTreeMap<String, String> {
        match self.base.validation_key.as_deref() {
            Some(key) => self.kind.nested_rules(key),
            None => BTreeMap::new(),
        }
    }

    fn defect(&self) -> Option<&str> {
        self.base.defect.as_deref()
    }

    fn definition(&self) -> FieldDescriptor {
        let base = &self.base;
        FieldDescriptor {
            name: base.name.clone().unwrap_or_default(),
            storage_type: K::STORAGE_TYPE,
            input_type: base.input_type.clone(),
            label: base.label.clone(),
            description: base.description.clone(),
            placeholder: base.placeholder.clone(),
            default_value: base.default_value.clone(),
            required: base.required,
            rule_string: base.rule_string(),
            validation_key: base.validation_key.clone().unwrap_or_default(),
            show_label: base.show_label,
            hidden: base.hidden,
            input_hidden: base.input_hidden,
            hidden_on: base.hidden_on.clone(),
            fillable: base.fillable,
            group: self.current_group().to_string(),
            extra_data: ExtraData {
                payload: self.kind.payload(base),
                custom: base.extra.clone(),
            },
        }
    }
}

impl<T: FieldSpec + ?Sized> FieldSpec for Box<T> {
    fn field_name(&self) -> Option<&str> {
        (**self).field_name()
    }

    fn group_key(&self) -> Option<&str> {
        (**self).group_key()
    }

    fn preferred_group(&self) -> Option<&'static str> {
        (**self).preferred_group()
    }

    fn nested_rules(&self) -> BTreeMap<String, String> {
        (**self).nested_rules()
    }

    fn defect(&self) -> Option<&str> {
        (**self).defect()
    }

    fn definition(&self) -> FieldDescriptor {
        (**self).definition()
    }
}
