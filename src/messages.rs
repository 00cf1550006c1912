use std::collections::BTreeMap;

use crate::error_map::{ErrorKey, ErrorMap};

/// Fallback when neither a per-field override nor the default table knows the
/// error key.
pub const DEFAULT_MESSAGE: &str = "This field is invalid.";

/// Per-field message overrides, consulted before the process-wide defaults.
#[derive(Clone, Debug, Default)]
pub struct MessageTable(BTreeMap<ErrorKey, String>);

impl MessageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ErrorKey, message: impl Into<String>) -> Self {
        self.0.insert(key, message.into());
        self
    }

    pub fn get(&self, key: ErrorKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }
}

fn default_message(key: ErrorKey) -> Option<&'static str> {
    match key.as_str() {
        "required" => Some("This field is required."),
        "email" => Some("Please enter a valid e-mail address."),
        _ => None,
    }
}

fn message_for(key: ErrorKey, overrides: Option<&MessageTable>) -> String {
    if let Some(message) = overrides.and_then(|table| table.get(key)) {
        return message.to_string();
    }
    default_message(key).unwrap_or(DEFAULT_MESSAGE).to_string()
}

/// Resolves the message for the first error key: per-field override, then the
/// default table, then [`DEFAULT_MESSAGE`].
pub fn resolve_message(errors: &ErrorMap, overrides: Option<&MessageTable>) -> String {
    message_for(errors.first_key(), overrides)
}

/// Collect-all display mode: one resolved message per error key.
pub fn resolve_messages(errors: &ErrorMap, overrides: Option<&MessageTable>) -> Vec<String> {
    errors.keys().map(|key| message_for(key, overrides)).collect()
}
