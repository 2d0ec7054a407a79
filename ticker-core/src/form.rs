//! Form state for the active ticket style.
//!
//! [`FormState`] is an ordered mapping from field key to the user's input,
//! closed over the current schema: writes to keys the schema does not define
//! are rejected. It serializes as a plain JSON object so drafts and history
//! records stay compatible with what the remote service stores.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FieldError, TickerError, TickerResult};
use crate::template::FieldSchema;

/// Editable state of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    /// Raw user input, untrimmed.
    #[serde(default)]
    pub value: String,
    /// Whether the field participates in generation.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl Default for FieldState {
    fn default() -> Self {
        Self {
            value: String::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormEntry {
    key: String,
    state: FieldState,
}

/// Ordered field key → input mapping for the active style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    entries: Vec<FormEntry>,
}

impl FormState {
    /// Empty form state initialised from a schema.
    #[must_use]
    pub fn from_schema(schema: &[FieldSchema]) -> Self {
        let entries = schema
            .iter()
            .map(|field| FormEntry {
                key: field.key.clone(),
                state: FieldState {
                    value: String::new(),
                    enabled: field.enabled,
                },
            })
            .collect();
        Self { entries }
    }

    /// Rebuild against a new schema, e.g. after a style switch.
    ///
    /// Keys present in both schemas keep their value and enabled flag; keys
    /// absent from the new schema are dropped. Afterwards the key set and
    /// order match the schema exactly.
    pub fn rebuild(&mut self, schema: &[FieldSchema]) {
        let mut rebuilt = Vec::with_capacity(schema.len());
        for field in schema {
            let state = self
                .get(&field.key)
                .cloned()
                .unwrap_or(FieldState {
                    value: String::new(),
                    enabled: field.enabled,
                });
            rebuilt.push(FormEntry {
                key: field.key.clone(),
                state,
            });
        }
        self.entries = rebuilt;
    }

    /// State of `key`, if the schema defines it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldState> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.state)
    }

    /// Set the value of `key`.
    ///
    /// # Errors
    ///
    /// Returns a field-scoped validation error when `key` is not part of the
    /// current schema.
    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> TickerResult<()> {
        let state = self.get_mut(key)?;
        state.value = value.into();
        Ok(())
    }

    /// Enable or disable `key`.
    ///
    /// # Errors
    ///
    /// Returns a field-scoped validation error when `key` is not part of the
    /// current schema.
    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> TickerResult<()> {
        let state = self.get_mut(key)?;
        state.enabled = enabled;
        Ok(())
    }

    /// Flip the enabled flag of `key`, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns a field-scoped validation error when `key` is not part of the
    /// current schema.
    pub fn toggle(&mut self, key: &str) -> TickerResult<bool> {
        let state = self.get_mut(key)?;
        state.enabled = !state.enabled;
        Ok(state.enabled)
    }

    /// Field keys in schema order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the form has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generation payload: every field key, with the trimmed value for
    /// enabled non-empty fields and `""` otherwise.
    ///
    /// Disabled and empty fields are sent as empty strings, not omitted; the
    /// renderer blanks those regions instead of falling back to sample text.
    #[must_use]
    pub fn user_data(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|entry| {
                let trimmed = entry.state.value.trim();
                let sent = if entry.state.enabled && !trimmed.is_empty() {
                    trimmed.to_string()
                } else {
                    String::new()
                };
                (entry.key.clone(), serde_json::Value::String(sent))
            })
            .collect()
    }

    /// Check required fields, reporting every failure.
    ///
    /// A required field fails when its trimmed value is empty, whether or
    /// not it is currently enabled.
    ///
    /// # Errors
    ///
    /// Returns [`TickerError::Validation`] listing all failing fields.
    pub fn validate(&self, schema: &[FieldSchema]) -> TickerResult<()> {
        let mut failures = Vec::new();
        for field in schema.iter().filter(|f| f.required) {
            let empty = self
                .get(&field.key)
                .is_none_or(|state| state.value.trim().is_empty());
            if empty {
                failures.push(FieldError::new(
                    field.key.clone(),
                    format!("{}不能为空", field.label),
                ));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TickerError::Validation(failures))
        }
    }

    fn get_mut(&mut self, key: &str) -> TickerResult<&mut FieldState> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key == key)
            .map(|entry| &mut entry.state)
            .ok_or_else(|| TickerError::field(key, format!("未知字段: {key}")))
    }
}

impl Serialize for FormState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key, &entry.state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FormState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FormStateVisitor;

        impl<'de> Visitor<'de> for FormStateVisitor {
            type Value = FormState;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field keys to field states")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FormState, A::Error> {
                let mut form = FormState::default();
                while let Some((key, state)) = access.next_entry::<String, FieldState>()? {
                    // Duplicate keys: last one wins, order of first wins.
                    if let Some(entry) = form.entries.iter_mut().find(|e| e.key == key) {
                        entry.state = state;
                    } else {
                        form.entries.push(FormEntry { key, state });
                    }
                }
                Ok(form)
            }
        }

        deserializer.deserialize_map(FormStateVisitor)
    }
}
