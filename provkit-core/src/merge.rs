//! Merged view of configured providers and remotely reported models.
//!
//! The same model can show up both in the remote "available" feed and among
//! the providers already bound to a source. The merged list shows each model
//! once: bound ones as [`ModelEntry::Configured`], the rest as
//! [`ModelEntry::Available`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{ModelMetadata, Provider};

/// A model name reported by the remote side, with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

impl AvailableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
        }
    }
}

/// One row of the merged model list.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEntry {
    /// A provider already bound under the selected source.
    Configured {
        provider: Provider,
        metadata: Option<ModelMetadata>,
    },
    /// A model the source offers that is not bound yet.
    Available {
        model: String,
        metadata: Option<ModelMetadata>,
    },
}

impl ModelEntry {
    /// Model name of the entry, if known.
    pub fn model_name(&self) -> Option<&str> {
        match self {
            Self::Configured { provider, .. } => provider.model.as_deref(),
            Self::Available { model, .. } => Some(model),
        }
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        match self {
            Self::Configured { metadata, .. } | Self::Available { metadata, .. } => {
                metadata.as_ref()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }

    fn matches(&self, term: &str) -> bool {
        match self {
            Self::Configured { provider, .. } => {
                provider.id.to_lowercase().contains(term)
                    || provider
                        .model
                        .as_deref()
                        .is_some_and(|model| model.to_lowercase().contains(term))
            }
            Self::Available { model, .. } => model.to_lowercase().contains(term),
        }
    }
}

/// Model names already bound among `configured`.
pub fn configured_model_names(configured: &[Provider]) -> HashSet<&str> {
    configured
        .iter()
        .filter_map(|provider| provider.model.as_deref())
        .collect()
}

/// Stable partition of `available`: names already configured first.
///
/// Relative order inside each half is kept from the input.
pub fn sorted_available<'a>(
    available: &'a [AvailableModel],
    configured: &HashSet<&str>,
) -> Vec<&'a AvailableModel> {
    let (mut bound, unbound): (Vec<_>, Vec<_>) = available
        .iter()
        .partition(|item| configured.contains(item.name.as_str()));
    bound.extend(unbound);
    bound
}

/// Build the merged, deduplicated model list for one source.
pub fn merge_model_entries(
    configured: &[Provider],
    available: &[AvailableModel],
    metadata: &HashMap<String, ModelMetadata>,
) -> Vec<ModelEntry> {
    let names = configured_model_names(configured);

    let configured_entries = configured.iter().map(|provider| ModelEntry::Configured {
        provider: provider.clone(),
        metadata: provider
            .model
            .as_deref()
            .and_then(|model| metadata.get(model))
            .cloned(),
    });

    let available_entries = sorted_available(available, &names)
        .into_iter()
        .filter(|item| !names.contains(item.name.as_str()))
        .map(|item| ModelEntry::Available {
            model: item.name.clone(),
            metadata: item
                .metadata
                .clone()
                .or_else(|| metadata.get(&item.name).cloned()),
        });

    configured_entries.chain(available_entries).collect()
}

/// Case-insensitive search over merged entries.
///
/// Returns a filtered presentation of borrowed entries; the merged list
/// itself is left untouched.
pub fn filter_model_entries<'a>(entries: &'a [ModelEntry], term: &str) -> Vec<&'a ModelEntry> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return entries.iter().collect();
    }
    entries.iter().filter(|entry| entry.matches(&term)).collect()
}
