//! Localization contract used for model display names.

use std::collections::HashMap;

pub trait Localizer: Send + Sync {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Option<String>;
}

/// Knows no keys; every lookup falls back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalization;

impl Localizer for NoLocalization {
    fn has(&self, _key: &str) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Fixed key → text table.
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizer {
    entries: HashMap<String, String>,
}

impl StaticLocalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, text: &str) -> Self {
        self.entries.insert(key.to_string(), text.to_string());
        self
    }
}

impl Localizer for StaticLocalizer {
    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}
