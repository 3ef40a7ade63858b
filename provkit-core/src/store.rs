//! Entity store: templates, sources, providers and the config schema.
//!
//! The store is replaced wholesale on every catalog load; the mutators here
//! exist for the local reconciliation steps the sync protocol performs
//! between a successful remote call and the reload that follows it.

use indexmap::IndexMap;
use serde_json::Value;

use crate::Result;
use crate::remote::CatalogPayload;
use crate::types::{Provider, ProviderSource, ProviderTemplate, ProviderType};

/// Everything one catalog fetch returns, decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub schema: Value,
    pub templates: IndexMap<String, ProviderTemplate>,
    pub sources: Vec<ProviderSource>,
    pub providers: Vec<Provider>,
}

impl Catalog {
    /// Decode a catalog payload. Templates live under
    /// `config_schema.provider.config_template`.
    pub fn from_payload(payload: CatalogPayload) -> Result<Self> {
        let templates = match payload.config_schema.pointer("/provider/config_template") {
            Some(Value::Object(map)) => serde_json::from_value(Value::Object(map.clone()))?,
            _ => IndexMap::new(),
        };

        Ok(Self {
            schema: payload.config_schema,
            templates,
            sources: payload.provider_sources,
            providers: payload.providers,
        })
    }
}

/// Help texts attached to the basic fields of the source schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaHints {
    pub id: String,
    pub key: String,
    pub api_base: String,
}

impl Default for SchemaHints {
    fn default() -> Self {
        Self {
            id: "Unique identifier of this provider source; models are bound as <id>/<model>"
                .to_string(),
            key: "API key(s) used to authenticate against the provider".to_string(),
            api_base: "Base URL of the provider API".to_string(),
        }
    }
}

/// In-memory collections of the catalog.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    catalog: Catalog,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all collections at once.
    pub fn replace(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    pub fn schema(&self) -> &Value {
        &self.catalog.schema
    }

    pub fn templates(&self) -> &IndexMap<String, ProviderTemplate> {
        &self.catalog.templates
    }

    pub fn sources(&self) -> &[ProviderSource] {
        &self.catalog.sources
    }

    pub fn providers(&self) -> &[Provider] {
        &self.catalog.providers
    }

    pub fn source(&self, id: &str) -> Option<&ProviderSource> {
        self.catalog.sources.iter().find(|source| source.id == id)
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.catalog.providers.iter().find(|provider| provider.id == id)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.catalog.sources.iter().map(|source| source.id.as_str())
    }

    /// Sources listed under a provider type (by tag or adapter).
    pub fn sources_of_type(&self, ty: &ProviderType) -> Vec<&ProviderSource> {
        self.catalog
            .sources
            .iter()
            .filter(|source| source.is_of_type(ty))
            .collect()
    }

    /// Providers bound under a source.
    pub fn providers_for_source(&self, source_id: &str) -> Vec<&Provider> {
        self.catalog
            .providers
            .iter()
            .filter(|provider| provider.source_id.as_deref() == Some(source_id))
            .collect()
    }

    /// Providers of a type, for tabs that list providers directly.
    ///
    /// Chat completion models are listed per source, so that tab is empty.
    pub fn providers_of_type(&self, ty: &ProviderType) -> Vec<&Provider> {
        if *ty == ProviderType::ChatCompletion {
            return Vec::new();
        }
        self.catalog
            .providers
            .iter()
            .filter(|provider| provider.resolved_type().as_ref() == Some(ty))
            .collect()
    }

    /// Deep copy of the schema with hints attached to the basic source fields.
    pub fn source_schema_with_hints(&self, hints: &SchemaHints) -> Value {
        let mut schema = self.catalog.schema.clone();
        if let Some(Value::Object(items)) = schema.pointer_mut("/provider/items") {
            for (field, hint) in [
                ("id", &hints.id),
                ("key", &hints.key),
                ("api_base", &hints.api_base),
            ] {
                if let Some(Value::Object(item)) = items.get_mut(field) {
                    item.insert("hint".to_string(), Value::String(hint.clone()));
                }
            }
        }
        schema
    }

    pub fn push_source(&mut self, source: ProviderSource) {
        self.catalog.sources.push(source);
    }

    /// Replace the source stored under `original_id`. Returns whether it was found.
    pub fn replace_source(&mut self, original_id: &str, record: ProviderSource) -> bool {
        match self
            .catalog
            .sources
            .iter_mut()
            .find(|source| source.id == original_id)
        {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Point every provider bound to `old_id` at `new_id`. Returns how many moved.
    pub fn rename_source_refs(&mut self, old_id: &str, new_id: &str) -> usize {
        let mut moved = 0;
        for provider in &mut self.catalog.providers {
            if provider.source_id.as_deref() == Some(old_id) {
                provider.source_id = Some(new_id.to_string());
                moved += 1;
            }
        }
        moved
    }

    /// Remove a source and every provider bound to it.
    pub fn remove_source(&mut self, id: &str) -> Option<ProviderSource> {
        self.catalog
            .providers
            .retain(|provider| provider.source_id.as_deref() != Some(id));
        let index = self.catalog.sources.iter().position(|source| source.id == id)?;
        Some(self.catalog.sources.remove(index))
    }

    pub fn push_provider(&mut self, provider: Provider) {
        self.catalog.providers.push(provider);
    }

    pub fn remove_provider(&mut self, id: &str) -> Option<Provider> {
        let index = self
            .catalog
            .providers
            .iter()
            .position(|provider| provider.id == id)?;
        Some(self.catalog.providers.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload() -> CatalogPayload {
        serde_json::from_value(json!({
            "config_schema": {
                "provider": {
                    "items": {
                        "id": {"type": "string"},
                        "key": {"type": "list"},
                        "api_base": {"type": "string"},
                    },
                    "config_template": {
                        "OpenAI": {"id": "openai", "provider_type": "chat_completion"},
                        "Edge TTS": {"provider_type": "text_to_speech", "type": "edge_tts"},
                    },
                },
            },
            "provider_sources": [
                {"id": "openai", "provider_type": "chat_completion"},
                {"id": "edge", "type": "edge_text_to_speech"},
            ],
            "providers": [
                {"id": "openai/gpt-4o", "provider_source_id": "openai", "model": "gpt-4o"},
                {"id": "openai/o3", "provider_source_id": "openai", "model": "o3"},
                {"id": "whisper", "type": "openai_whisper_api"},
            ],
        }))
        .unwrap()
    }

    fn store() -> EntityStore {
        let mut store = EntityStore::new();
        store.replace(Catalog::from_payload(payload()).unwrap());
        store
    }

    #[test]
    fn catalog_extracts_templates_from_schema() {
        let catalog = Catalog::from_payload(payload()).unwrap();
        let keys: Vec<_> = catalog.templates.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["OpenAI", "Edge TTS"]);
    }

    #[test]
    fn catalog_without_templates_is_empty() {
        let catalog = Catalog::from_payload(CatalogPayload::default()).unwrap();
        assert!(catalog.templates.is_empty());
        assert!(catalog.sources.is_empty());
    }

    #[test]
    fn malformed_templates_are_an_error() {
        let payload: CatalogPayload = serde_json::from_value(json!({
            "config_schema": {"provider": {"config_template": {"Bad": {"provider_type": 7}}}},
        }))
        .unwrap();
        assert!(Catalog::from_payload(payload).is_err());
    }

    #[test]
    fn sources_of_type_matches_tag_and_adapter() {
        let store = store();
        let chat: Vec<_> = store
            .sources_of_type(&ProviderType::ChatCompletion)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(chat, vec!["openai"]);

        let tts: Vec<_> = store
            .sources_of_type(&ProviderType::TextToSpeech)
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(tts, vec!["edge"]);
    }

    #[test]
    fn providers_of_type_skips_chat_and_resolves_legacy() {
        let store = store();
        assert!(store.providers_of_type(&ProviderType::ChatCompletion).is_empty());

        let stt = store.providers_of_type(&ProviderType::SpeechToText);
        assert_eq!(stt.len(), 1);
        assert_eq!(stt[0].id, "whisper");
    }

    #[test]
    fn rename_moves_only_matching_providers() {
        let mut store = store();
        assert_eq!(store.rename_source_refs("openai", "oai"), 2);
        assert_eq!(store.providers_for_source("oai").len(), 2);
        assert!(store.providers_for_source("openai").is_empty());
        assert_eq!(store.provider("whisper").unwrap().source_id, None);
    }

    #[test]
    fn remove_source_cascades_to_providers() {
        let mut store = store();
        let removed = store.remove_source("openai");

        assert_eq!(removed.map(|s| s.id), Some("openai".to_string()));
        assert!(store.source("openai").is_none());
        assert_eq!(store.providers().len(), 1);
    }

    #[test]
    fn replace_source_reports_missing_record() {
        let mut store = store();
        let mut renamed = ProviderSource::new("oai");
        renamed.api_base = Some("x".to_string());

        assert!(store.replace_source("openai", renamed));
        assert!(store.source("oai").is_some());
        assert!(!store.replace_source("missing", ProviderSource::new("missing")));
    }

    #[test]
    fn schema_hints_are_added_to_a_copy() {
        let store = store();
        let schema = store.source_schema_with_hints(&SchemaHints::default());

        assert!(schema["provider"]["items"]["key"]["hint"].is_string());
        assert!(store.schema()["provider"]["items"]["key"].get("hint").is_none());
    }
}
