//! Creating provider sources from catalog templates.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::types::{ProviderSource, ProviderTemplate, ProviderType};
use crate::{Error, Result};

/// Template fields that never belong on a source.
///
/// Some legacy templates carry provider-shaped fields; they are dropped
/// instead of copied.
pub const SOURCE_EXCLUDED_FIELDS: [&str; 6] = [
    "id",
    "enable",
    "model",
    "provider_source_id",
    "modalities",
    "custom_extra_body",
];

/// A template offered for the active provider type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateChoice {
    pub key: String,
    pub label: String,
}

/// Templates whose provider type matches `ty`, in catalog order.
pub fn available_templates(
    templates: &IndexMap<String, ProviderTemplate>,
    ty: &ProviderType,
) -> Vec<TemplateChoice> {
    templates
        .iter()
        .filter(|(_, template)| template.provider_type.as_ref() == Some(ty))
        .map(|(key, _)| TemplateChoice {
            key: key.clone(),
            label: key.clone(),
        })
        .collect()
}

/// First free id among `base`, `base_1`, `base_2`, ...
pub fn unique_source_id<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let existing: HashSet<&str> = existing.into_iter().collect();
    if !existing.contains(base) {
        return base.to_string();
    }

    (1u64..)
        .map(|counter| format!("{base}_{counter}"))
        .find(|candidate| !existing.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Build a new, enabled source from the template stored under `key`.
///
/// The id is derived from the template's default id (or the key) and made
/// unique against `existing_ids`.
pub fn source_from_template<'a>(
    templates: &IndexMap<String, ProviderTemplate>,
    key: &str,
    existing_ids: impl IntoIterator<Item = &'a str>,
) -> Result<ProviderSource> {
    let template = templates
        .get(key)
        .ok_or_else(|| Error::NotFound(format!("provider template '{key}'")))?;

    let base_id = template.id.as_deref().unwrap_or(key);
    let id = unique_source_id(base_id, existing_ids);

    let mut fields: serde_json::Map<String, Value> = template
        .defaults
        .iter()
        .filter(|(name, _)| !SOURCE_EXCLUDED_FIELDS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    fields.insert("id".to_string(), Value::String(id));
    fields.insert("enable".to_string(), Value::Bool(true));

    let mut source: ProviderSource = serde_json::from_value(Value::Object(fields))?;
    source.provider_type = template.provider_type.clone();
    source.adapter = template.adapter.clone();
    source.family = template.family.clone();
    Ok(source)
}
