//! Basic/advanced projections over the editable source.
//!
//! Both views borrow the editable copy and forward every read and write to
//! it, so the two surfaces can never drift apart. Writes run through the
//! copy's update path and flip the dirty flag.

use serde_json::Value;

use crate::editable::EditableSource;
use crate::types::SourceKey;
use crate::{Error, Result};

/// Fields shown in the basic view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicField {
    Id,
    Key,
    ApiBase,
}

impl BasicField {
    pub const ALL: [BasicField; 3] = [BasicField::Id, BasicField::Key, BasicField::ApiBase];

    /// Wire name of the field.
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Key => "key",
            Self::ApiBase => "api_base",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Fields owned by dedicated controls; neither basic nor advanced.
pub const MANAGED_FIELDS: [&str; 4] = ["enable", "type", "provider_type", "provider"];

/// Whether a field name is handled by the basic view or a dedicated control.
pub fn is_reserved(name: &str) -> bool {
    BasicField::from_name(name).is_some() || MANAGED_FIELDS.contains(&name)
}

/// Live view over the identifier, credential and base URL.
pub struct BasicView<'a> {
    editable: &'a mut EditableSource,
}

impl<'a> BasicView<'a> {
    pub(crate) fn new(editable: &'a mut EditableSource) -> Self {
        Self { editable }
    }

    pub fn id(&self) -> &str {
        &self.editable.record().id
    }

    pub fn key(&self) -> Option<&SourceKey> {
        self.editable.record().key.as_ref()
    }

    pub fn api_base(&self) -> Option<&str> {
        self.editable.record().api_base.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.editable.update(|source| source.id = id);
    }

    pub fn set_key(&mut self, key: Option<SourceKey>) {
        self.editable.update(|source| source.key = key);
    }

    pub fn set_api_base(&mut self, api_base: impl Into<String>) {
        let api_base = api_base.into();
        self.editable.update(|source| source.api_base = Some(api_base));
    }

    /// Read a field as JSON.
    pub fn get(&self, field: BasicField) -> Value {
        let record = self.editable.record();
        match field {
            BasicField::Id => Value::String(record.id.clone()),
            BasicField::Key => record
                .key
                .as_ref()
                .and_then(|key| serde_json::to_value(key).ok())
                .unwrap_or(Value::Null),
            BasicField::ApiBase => record
                .api_base
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        }
    }

    /// Write a field from JSON, checking its shape first.
    pub fn set(&mut self, field: BasicField, value: Value) -> Result<()> {
        match (field, value) {
            (BasicField::Id, Value::String(id)) if !id.trim().is_empty() => self.set_id(id),
            (BasicField::Id, _) => return Err(invalid(field, "expected a non-empty string")),
            (BasicField::Key, Value::Null) => self.set_key(None),
            (BasicField::Key, value) => {
                let key: SourceKey = serde_json::from_value(value)
                    .map_err(|_| invalid(field, "expected a string or a list of strings"))?;
                self.set_key(Some(key));
            }
            (BasicField::ApiBase, Value::Null) => {
                self.editable.update(|source| source.api_base = None);
            }
            (BasicField::ApiBase, Value::String(api_base)) => self.set_api_base(api_base),
            (BasicField::ApiBase, _) => return Err(invalid(field, "expected a string")),
        }
        Ok(())
    }
}

fn invalid(field: BasicField, reason: &str) -> Error {
    Error::InvalidField {
        field: field.name().to_string(),
        reason: reason.to_string(),
    }
}

/// Live view over every provider-family-specific field.
pub struct AdvancedView<'a> {
    editable: &'a mut EditableSource,
}

impl<'a> AdvancedView<'a> {
    pub(crate) fn new(editable: &'a mut EditableSource) -> Self {
        Self { editable }
    }

    /// Field names in record order.
    pub fn keys(&self) -> Vec<String> {
        self.editable.record().extra.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.editable.record().extra.get(name)
    }

    pub fn len(&self) -> usize {
        self.editable.record().extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write an advanced field. Basic and managed names are refused.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if is_reserved(name) {
            return Err(Error::InvalidField {
                field: name.to_string(),
                reason: "not an advanced field".to_string(),
            });
        }
        self.editable.update(|source| {
            source.extra.insert(name.to_string(), value);
        });
        Ok(())
    }
}
