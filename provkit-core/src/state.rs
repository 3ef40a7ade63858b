//! Session state: the store, the active tab, and the one selected source.
//!
//! `SessionState` is a plain value. Every derived view (displayed sources,
//! merged model list, field projections) is computed from it on demand, and
//! several sessions can coexist without sharing anything.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::editable::EditableSource;
use crate::fields::{AdvancedView, BasicView};
use crate::merge::{
    AvailableModel, ModelEntry, configured_model_names, filter_model_entries, merge_model_entries,
};
use crate::remote::ModelsPayload;
use crate::store::{Catalog, EntityStore, SchemaHints};
use crate::template::{TemplateChoice, available_templates, source_from_template};
use crate::types::{ModelMetadata, Provider, ProviderSource, ProviderType, provider_id};
use crate::Result;

/// What a caller can pick in the source list.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChoice {
    /// An existing source record.
    Source(ProviderSource),
    /// A "new from template" entry; picking it instantiates the template.
    Placeholder { template_key: String },
}

/// The selected source: its editable copy and the id it had when selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    original_id: String,
    editable: EditableSource,
    epoch: u64,
}

impl Selection {
    /// Id of the stored record, before any unsaved rename.
    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    pub fn editable(&self) -> &EditableSource {
        &self.editable
    }

    pub fn editable_mut(&mut self) -> &mut EditableSource {
        &mut self.editable
    }

    pub fn record(&self) -> &ProviderSource {
        self.editable.record()
    }

    pub fn is_dirty(&self) -> bool {
        self.editable.is_dirty()
    }

    /// Epoch at which this selection was made.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Sync status of the selected source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Clean,
    Dirty,
    Saving,
    Error(String),
}

#[derive(Debug, Default)]
pub struct SessionState {
    store: EntityStore,
    provider_type: ProviderType,
    selection: Option<Selection>,
    epoch: u64,
    available_models: Vec<AvailableModel>,
    model_metadata: HashMap<String, ModelMetadata>,
    model_search: String,
    manual_model_id: String,
    testing: BTreeSet<String>,
    saving: bool,
    loading_models: bool,
    last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on the tab a free-form hint resolves to.
    pub fn with_default_tab(tab: &str) -> Self {
        Self {
            provider_type: ProviderType::from_tab(tab),
            ..Self::default()
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// Swap in a freshly fetched catalog. The selection is left alone.
    pub fn load_catalog(&mut self, catalog: Catalog) {
        self.store.replace(catalog);
    }

    // Tabs

    pub fn provider_type(&self) -> &ProviderType {
        &self.provider_type
    }

    pub fn set_provider_type(&mut self, ty: ProviderType) {
        self.provider_type = ty;
    }

    pub fn set_default_tab(&mut self, value: &str) {
        self.provider_type = ProviderType::from_tab(value);
    }

    /// Templates offered on the active tab.
    pub fn available_source_types(&self) -> Vec<TemplateChoice> {
        available_templates(self.store.templates(), &self.provider_type)
    }

    /// Sources listed on the active tab.
    pub fn displayed_sources(&self) -> Vec<&ProviderSource> {
        self.store.sources_of_type(&self.provider_type)
    }

    /// Providers listed directly on the active tab (none for chat completion).
    pub fn filtered_providers(&self) -> Vec<&Provider> {
        self.store.providers_of_type(&self.provider_type)
    }

    /// The source schema with help texts on the basic fields.
    pub fn source_schema(&self) -> Value {
        self.store.source_schema_with_hints(&SchemaHints::default())
    }

    // Selection

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Id of the stored record behind the selection.
    pub fn selected_id(&self) -> Option<&str> {
        self.selection.as_ref().map(Selection::original_id)
    }

    pub fn editable(&self) -> Option<&ProviderSource> {
        self.selection.as_ref().map(Selection::record)
    }

    pub fn is_dirty(&self) -> bool {
        self.selection.as_ref().is_some_and(Selection::is_dirty)
    }

    /// Current selection epoch; bumped on every selection change.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Select a source, a template placeholder, or nothing.
    ///
    /// Only a placeholder with an unknown template key can fail.
    pub fn select(&mut self, choice: Option<SourceChoice>) -> Result<()> {
        match choice {
            Some(SourceChoice::Placeholder { template_key }) => {
                self.instantiate_template(&template_key)?;
            }
            Some(SourceChoice::Source(record)) => self.set_selection(EditableSource::new(record)),
            None => self.clear_selection(),
        }
        Ok(())
    }

    /// Select a stored source by id. Returns false if there is none.
    pub fn select_id(&mut self, id: &str) -> bool {
        match self.store.source(id).cloned() {
            Some(record) => {
                self.set_selection(EditableSource::new(record));
                true
            }
            None => false,
        }
    }

    /// Create a source from a template, add it to the store and select it.
    ///
    /// The new source exists only locally, so it starts dirty. Returns its id.
    pub fn instantiate_template(&mut self, key: &str) -> Result<String> {
        let source = source_from_template(self.store.templates(), key, self.store.source_ids())?;
        let id = source.id.clone();
        self.store.push_source(source.clone());
        self.set_selection(EditableSource::unsaved(source));
        Ok(id)
    }

    fn set_selection(&mut self, editable: EditableSource) {
        self.epoch += 1;
        self.selection = Some(Selection {
            original_id: editable.record().id.clone(),
            editable,
            epoch: self.epoch,
        });
        self.reset_selection_scope();
    }

    fn clear_selection(&mut self) {
        if self.selection.is_some() {
            self.epoch += 1;
        }
        self.selection = None;
        self.reset_selection_scope();
    }

    fn reset_selection_scope(&mut self) {
        self.available_models.clear();
        self.model_metadata.clear();
        self.last_error = None;
    }

    /// Basic field projection of the selection.
    pub fn basic_view(&mut self) -> Option<BasicView<'_>> {
        self.selection.as_mut().map(|s| s.editable.basic())
    }

    /// Advanced field projection of the selection.
    pub fn advanced_view(&mut self) -> Option<AdvancedView<'_>> {
        self.selection.as_mut().map(|s| s.editable.advanced())
    }

    /// Apply a free-form edit to the selection's editable copy.
    pub fn edit<R>(&mut self, edit: impl FnOnce(&mut ProviderSource) -> R) -> Option<R> {
        self.selection.as_mut().map(|s| s.editable.update(edit))
    }

    pub fn sync_state(&self) -> SyncState {
        if self.saving {
            return SyncState::Saving;
        }
        match (&self.last_error, self.is_dirty()) {
            (Some(message), true) => SyncState::Error(message.clone()),
            (_, true) => SyncState::Dirty,
            _ => SyncState::Clean,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // Models

    /// Providers bound under the selected source.
    pub fn source_providers(&self) -> Vec<&Provider> {
        match self.selected_id() {
            Some(id) => self.store.providers_for_source(id),
            None => Vec::new(),
        }
    }

    fn source_provider_records(&self) -> Vec<Provider> {
        self.source_providers().into_iter().cloned().collect()
    }

    pub fn available_models(&self) -> &[AvailableModel] {
        &self.available_models
    }

    pub fn model_metadata(&self, model: &str) -> Option<&ModelMetadata> {
        self.model_metadata.get(model)
    }

    /// Configured and available models of the selection, configured first.
    pub fn merged_model_entries(&self) -> Vec<ModelEntry> {
        if self.selection.is_none() {
            return Vec::new();
        }
        merge_model_entries(
            &self.source_provider_records(),
            &self.available_models,
            &self.model_metadata,
        )
    }

    /// Merged entries narrowed by the model search term.
    pub fn filtered_model_entries(&self) -> Vec<ModelEntry> {
        let merged = self.merged_model_entries();
        filter_model_entries(&merged, &self.model_search)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn model_search(&self) -> &str {
        &self.model_search
    }

    pub fn set_model_search(&mut self, term: impl Into<String>) {
        self.model_search = term.into();
    }

    pub fn manual_model_id(&self) -> &str {
        &self.manual_model_id
    }

    pub fn set_manual_model_id(&mut self, model: impl Into<String>) {
        self.manual_model_id = model.into();
    }

    /// `<source>/<model>` for the manual model id, if both are present.
    pub fn manual_provider_id(&self) -> Option<String> {
        let source = self.selected_id()?;
        let model = self.manual_model_id.trim();
        (!model.is_empty()).then(|| provider_id(source, model))
    }

    pub fn model_already_configured(&self, model: &str) -> bool {
        configured_model_names(&self.source_provider_records()).contains(model)
    }

    // Flags

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_loading_models(&self) -> bool {
        self.loading_models
    }

    pub fn is_testing(&self, provider_id: &str) -> bool {
        self.testing.contains(provider_id)
    }

    /// Providers with a check in flight, sorted by id.
    pub fn testing_providers(&self) -> Vec<&str> {
        self.testing.iter().map(String::as_str).collect()
    }

    // Reconciliation steps used by the sync protocol

    pub(crate) fn set_saving(&mut self, saving: bool) {
        self.saving = saving;
    }

    pub(crate) fn set_loading_models(&mut self, loading: bool) {
        self.loading_models = loading;
    }

    pub(crate) fn begin_test(&mut self, provider_id: &str) {
        self.testing.insert(provider_id.to_string());
    }

    pub(crate) fn end_test(&mut self, provider_id: &str) {
        self.testing.remove(provider_id);
    }

    /// Record a confirmed save of `saved`, submitted under `original_id`.
    ///
    /// Store updates always apply. Selection updates apply only if the
    /// selection made at `epoch` is still current; edits made while the save
    /// was in flight are kept and leave the copy dirty.
    pub(crate) fn commit_save(&mut self, original_id: &str, saved: ProviderSource, epoch: u64) {
        if saved.id != original_id {
            self.store.rename_source_refs(original_id, &saved.id);
        }
        self.store.replace_source(original_id, saved.clone());

        if !self.is_current(epoch) {
            self.follow_rename(original_id, &saved);
            return;
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.original_id = saved.id.clone();
            if selection.editable.record() == &saved {
                selection.editable.replace(saved);
                selection.editable.mark_clean();
            }
        }
        self.last_error = None;
    }

    /// Re-point a later selection of the same stored record at its saved id.
    fn follow_rename(&mut self, original_id: &str, saved: &ProviderSource) {
        if saved.id == original_id {
            return;
        }
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        if selection.original_id != original_id {
            return;
        }
        selection.original_id = saved.id.clone();
        if !selection.editable.is_dirty() {
            selection.editable.replace(saved.clone());
        } else if selection.editable.record().id == original_id {
            let new_id = saved.id.clone();
            selection.editable.update(|source| source.id = new_id);
        }
    }

    pub(crate) fn fail_save(&mut self, epoch: u64, message: String) {
        if self.is_current(epoch) {
            self.last_error = Some(message);
        }
    }

    /// Replace the model list and metadata wholesale. Returns the model count.
    pub(crate) fn replace_models(&mut self, payload: ModelsPayload) -> usize {
        let ModelsPayload {
            models,
            model_metadata,
        } = payload;
        self.available_models = models
            .into_iter()
            .map(|name| AvailableModel {
                metadata: model_metadata.get(&name).cloned(),
                name,
            })
            .collect();
        self.model_metadata = model_metadata;
        self.available_models.len()
    }

    pub(crate) fn clear_model_metadata(&mut self) {
        self.model_metadata.clear();
    }

    /// Drop a deleted source locally, clearing the selection if it was selected.
    pub(crate) fn forget_source(&mut self, id: &str) {
        self.store.remove_source(id);
        if self.selected_id() == Some(id) {
            self.clear_selection();
        }
    }
}
