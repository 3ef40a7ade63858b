//! In-process configuration authority.
//!
//! `InMemoryRemote` mirrors the server-side rules the engine relies on:
//! renames cascade to providers, duplicate ids are rejected, deleting a
//! source deletes its providers. Model lists and check results are scripted,
//! and failures can be queued per call to exercise error paths.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use super::{
    Ack, ApiResponse, ApiStatus, CatalogPayload, CheckPayload, ModelsPayload, RemoteAuthority,
};
use crate::types::{ModelMetadata, Provider, ProviderSource, ProviderTemplate};
use crate::{Error, Result};

/// Remote operations, for call logs and failure scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    TemplateCatalog,
    UpdateSource,
    DeleteSource,
    AvailableModels,
    CreateProvider,
    DeleteProvider,
    CheckProvider,
}

/// A scripted failure for the next call of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Answer with `status: error` and this message.
    Rejected(String),
    /// Fail before answering.
    Transport(String),
    /// Answer with `status: ok` but no payload.
    Empty,
}

#[derive(Default)]
struct MemoryState {
    templates: IndexMap<String, ProviderTemplate>,
    sources: Vec<ProviderSource>,
    providers: Vec<Provider>,
    models: HashMap<String, ModelsPayload>,
    checks: HashMap<String, Option<String>>,
    failures: HashMap<RemoteCall, VecDeque<Failure>>,
    calls: Vec<RemoteCall>,
}

impl MemoryState {
    /// Log the call and pop a scripted failure, if any.
    fn enter<T>(&mut self, call: RemoteCall) -> Result<Option<ApiResponse<T>>> {
        self.calls.push(call);
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(Failure::Rejected(message)) => Ok(Some(ApiResponse::error(message))),
            Some(Failure::Transport(message)) => Err(Error::Transport(message)),
            Some(Failure::Empty) => Ok(Some(ApiResponse {
                status: ApiStatus::Ok,
                message: None,
                data: None,
            })),
            None => Ok(None),
        }
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.iter().any(|source| source.id == id)
    }

    fn schema(&self) -> Value {
        let templates: Map<String, Value> = self
            .templates
            .iter()
            .filter_map(|(key, template)| {
                serde_json::to_value(template)
                    .ok()
                    .map(|value| (key.clone(), value))
            })
            .collect();
        json!({ "provider": { "config_template": templates } })
    }
}

/// [`RemoteAuthority`] that keeps everything in memory.
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template to the catalog.
    pub fn with_template(mut self, key: impl Into<String>, template: ProviderTemplate) -> Self {
        self.state.get_mut().templates.insert(key.into(), template);
        self
    }

    /// Add a stored source.
    pub fn with_source(mut self, source: ProviderSource) -> Self {
        self.state.get_mut().sources.push(source);
        self
    }

    /// Add a stored provider.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.state.get_mut().providers.push(provider);
        self
    }

    /// Script the models a source reports.
    pub fn with_models(
        mut self,
        source_id: impl Into<String>,
        models: Vec<String>,
        model_metadata: HashMap<String, ModelMetadata>,
    ) -> Self {
        self.state.get_mut().models.insert(
            source_id.into(),
            ModelsPayload {
                models,
                model_metadata,
            },
        );
        self
    }

    /// Replace the scripted model list of a source after construction.
    pub async fn set_models(
        &self,
        source_id: impl Into<String>,
        models: Vec<String>,
        model_metadata: HashMap<String, ModelMetadata>,
    ) {
        self.state.lock().await.models.insert(
            source_id.into(),
            ModelsPayload {
                models,
                model_metadata,
            },
        );
    }

    /// Script a provider check result; `None` means the check passes.
    pub fn with_check_result(mut self, provider_id: impl Into<String>, error: Option<String>) -> Self {
        self.state.get_mut().checks.insert(provider_id.into(), error);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call of kind `call` fail.
    pub async fn fail_next(&self, call: RemoteCall, failure: Failure) {
        self.state
            .lock()
            .await
            .failures
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of calls of one kind received so far.
    pub async fn call_count(&self, call: RemoteCall) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    pub async fn sources(&self) -> Vec<ProviderSource> {
        self.state.lock().await.sources.clone()
    }

    pub async fn providers(&self) -> Vec<Provider> {
        self.state.lock().await.providers.clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteAuthority for InMemoryRemote {
    async fn template_catalog(&self) -> Result<ApiResponse<CatalogPayload>> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::TemplateCatalog)? {
            return Ok(failed);
        }
        Ok(ApiResponse::ok(CatalogPayload {
            config_schema: state.schema(),
            provider_sources: state.sources.clone(),
            providers: state.providers.clone(),
        }))
    }

    async fn update_source(&self, config: &ProviderSource, original_id: &str) -> Result<Ack> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::UpdateSource)? {
            return Ok(failed);
        }

        let renamed = config.id != original_id;
        match state.sources.iter().position(|s| s.id == original_id) {
            Some(_) if renamed && state.has_source(&config.id) => Ok(Ack::error(format!(
                "provider source '{}' already exists",
                config.id
            ))),
            Some(index) => {
                state.sources[index] = config.clone();
                if renamed {
                    for provider in &mut state.providers {
                        if provider.source_id.as_deref() == Some(original_id) {
                            provider.source_id = Some(config.id.clone());
                        }
                    }
                }
                Ok(Ack::done().with_message("provider source updated"))
            }
            None if state.has_source(&config.id) => Ok(Ack::error(format!(
                "provider source '{}' already exists",
                config.id
            ))),
            None => {
                state.sources.push(config.clone());
                Ok(Ack::done().with_message("provider source created"))
            }
        }
    }

    async fn delete_source(&self, id: &str) -> Result<Ack> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::DeleteSource)? {
            return Ok(failed);
        }
        if !state.has_source(id) {
            return Ok(Ack::error(format!("provider source '{id}' not found")));
        }
        state.sources.retain(|source| source.id != id);
        state
            .providers
            .retain(|provider| provider.source_id.as_deref() != Some(id));
        Ok(Ack::done())
    }

    async fn available_models(&self, source_id: &str) -> Result<ApiResponse<ModelsPayload>> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::AvailableModels)? {
            return Ok(failed);
        }
        if !state.has_source(source_id) {
            return Ok(ApiResponse::error(format!(
                "provider source '{source_id}' not found"
            )));
        }
        Ok(ApiResponse::ok(
            state.models.get(source_id).cloned().unwrap_or_default(),
        ))
    }

    async fn create_provider(&self, provider: &Provider) -> Result<Ack> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::CreateProvider)? {
            return Ok(failed);
        }
        if state.providers.iter().any(|p| p.id == provider.id) {
            return Ok(Ack::error(format!("provider '{}' already exists", provider.id)));
        }
        state.providers.push(provider.clone());
        Ok(Ack::done())
    }

    async fn delete_provider(&self, id: &str) -> Result<Ack> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::DeleteProvider)? {
            return Ok(failed);
        }
        let before = state.providers.len();
        state.providers.retain(|provider| provider.id != id);
        if state.providers.len() == before {
            return Ok(Ack::error(format!("provider '{id}' not found")));
        }
        Ok(Ack::done())
    }

    async fn check_provider(&self, id: &str) -> Result<ApiResponse<CheckPayload>> {
        self.pause().await;
        let mut state = self.state.lock().await;
        if let Some(failed) = state.enter(RemoteCall::CheckProvider)? {
            return Ok(failed);
        }
        let error = state.checks.get(id).cloned().unwrap_or(None);
        Ok(ApiResponse::ok(CheckPayload { error }))
    }
}
