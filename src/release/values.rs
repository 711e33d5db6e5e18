//! Value overrides for releases.
//!
//! Overrides address nested values with dotted keys (`image.tag`) and are
//! typed the way `helm --set` types them: booleans, numbers and `null` are
//! recognised, everything else stays a string.

use serde_yaml::{Mapping, Value};

use crate::error::{ReleaseError, Result};

use super::types::Release;

impl Release {
    /// Returns a copy with `key` set to the typed form of `raw`.
    ///
    /// Missing intermediate mappings are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the key has an empty segment or an intermediate
    /// segment already holds a non-mapping value.
    pub fn with_value(&self, key: &str, raw: &str) -> Result<Self> {
        let mut release = self.clone();
        set_path(&mut release.values, key, parse_scalar(raw)).map_err(|message| {
            ReleaseError::ValueOverride {
                release: self.name.clone(),
                key: key.to_string(),
                message,
            }
        })?;
        Ok(release)
    }

    /// Returns a copy with every override applied, or the first failure.
    ///
    /// # Errors
    ///
    /// Returns an error if any single override cannot be applied; the
    /// original release is left untouched.
    pub fn with_values<'a>(
        &self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self> {
        overrides
            .into_iter()
            .try_fold(self.clone(), |release, (key, raw)| release.with_value(key, raw))
    }
}

/// Types a raw override value.
fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Sets `value` at the dotted `key` inside `values`.
fn set_path(values: &mut Mapping, key: &str, value: Value) -> std::result::Result<(), String> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(String::from("key has an empty segment"));
    }

    let Some((last, parents)) = segments.split_last() else {
        return Err(String::from("key is empty"));
    };

    let mut current = values;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = current
            .entry(Value::String((*segment).to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));

        if entry.is_null() {
            *entry = Value::Mapping(Mapping::new());
        }

        current = match entry {
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(format!(
                    "'{}' holds a non-mapping value",
                    segments[..=depth].join(".")
                ));
            }
        };
    }

    current.insert(Value::String((*last).to_string()), value);
    Ok(())
}
