//! Save/reload protocol between the session and the remote authority.
//!
//! Every mutating operation follows the same shape: snapshot what it needs
//! from the session, release the lock, call the remote side, then reconcile
//! the session with the outcome and reload the catalog. The reload is the
//! consistency mechanism; the local reconciliation only keeps the session
//! usable until the reload lands.
//!
//! Completion handlers capture the selection epoch before awaiting and skip
//! selection-scoped writes when the selection changed in the meantime.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::confirm::Confirm;
use crate::error::describe;
use crate::notify::{Notice, Notifier};
use crate::remote::{ApiResponse, CheckPayload, RemoteAuthority};
use crate::state::{SessionState, SourceChoice};
use crate::store::Catalog;
use crate::types::Provider;
use crate::{Error, Result};

const NOTHING_SELECTED: &str = "no provider source is selected";
const EMPTY_CATALOG: &str = "catalog response carried no data";
const TEMPLATE_NOT_FOUND: &str = "Provider template not found";
const SOURCE_NOT_FOUND: &str = "Provider source not found";
const SAVE_SUCCESS: &str = "Provider source saved";
const SAVE_FAILED: &str = "Failed to save provider source";
const NO_MODELS_FOUND: &str = "No models found";
const FETCH_MODELS_FAILED: &str = "Failed to fetch models";
const ADD_MODEL_FAILED: &str = "Failed to add model";
const EMPTY_MODEL_ID: &str = "model id is empty";
const DELETE_SOURCE_SUCCESS: &str = "Provider source deleted";
const DELETE_SOURCE_FAILED: &str = "Failed to delete provider source";
const DELETE_PROVIDER_SUCCESS: &str = "Model deleted";
const DELETE_PROVIDER_FAILED: &str = "Failed to delete model";
const TEST_FAILED: &str = "Model test failed";

/// Drives one session against a remote authority.
pub struct ProviderSync {
    remote: Arc<dyn RemoteAuthority>,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn Confirm>,
    state: RwLock<SessionState>,
}

impl ProviderSync {
    pub fn new(
        remote: Arc<dyn RemoteAuthority>,
        notifier: Arc<dyn Notifier>,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            remote,
            notifier,
            confirm,
            state: RwLock::new(SessionState::new()),
        }
    }

    /// Start on the tab a free-form hint resolves to.
    pub fn with_default_tab(mut self, tab: &str) -> Self {
        self.state.get_mut().set_default_tab(tab);
        self
    }

    pub async fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Write access for local edits (field views, search terms, tabs).
    pub async fn state_mut(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().await
    }

    /// Fetch the catalog and replace the store with it.
    ///
    /// On failure the store keeps its previous contents.
    pub async fn load_catalog(&self) -> Result<()> {
        let catalog = self
            .remote
            .template_catalog()
            .await
            .and_then(ApiResponse::into_result)
            .and_then(|response| {
                response
                    .data
                    .ok_or_else(|| Error::Transport(EMPTY_CATALOG.to_string()))
            })
            .and_then(Catalog::from_payload);

        match catalog {
            Ok(catalog) => {
                debug!(
                    sources = catalog.sources.len(),
                    providers = catalog.providers.len(),
                    templates = catalog.templates.len(),
                    "Catalog loaded"
                );
                self.state.write().await.load_catalog(catalog);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load provider catalog");
                Err(e)
            }
        }
    }

    async fn reload(&self) {
        // Failures are logged by load_catalog; the previous store stays.
        let _ = self.load_catalog().await;
    }

    /// Select a source, a template placeholder, or nothing.
    pub async fn select(&self, choice: Option<SourceChoice>) -> Result<()> {
        let result = self.state.write().await.select(choice);
        if let Err(e) = &result {
            self.notify_error(e, TEMPLATE_NOT_FOUND);
        }
        result
    }

    /// Select a stored source by id.
    pub async fn select_id(&self, id: &str) -> Result<()> {
        if self.state.write().await.select_id(id) {
            return Ok(());
        }
        let e = Error::NotFound(format!("provider source '{id}'"));
        self.notify_error(&e, SOURCE_NOT_FOUND);
        Err(e)
    }

    /// Create a source from a template and select it. Returns the new id.
    pub async fn instantiate(&self, template_key: &str) -> Result<String> {
        let result = self.state.write().await.instantiate_template(template_key);
        match &result {
            Ok(id) => info!(source_id = %id, template = template_key, "Source created from template"),
            Err(e) => self.notify_error(e, TEMPLATE_NOT_FOUND),
        }
        result
    }

    /// Persist the selected source, then reload.
    ///
    /// The source is sent with the id it had when selected so the remote
    /// side can tell a rename from a create. On failure the copy stays dirty.
    pub async fn save(&self) -> Result<()> {
        let (config, original_id, epoch) = {
            let mut state = self.state.write().await;
            let selection = state
                .selection()
                .ok_or_else(|| Error::Unavailable(NOTHING_SELECTED.to_string()))?;
            let snapshot = (
                selection.record().clone(),
                selection.original_id().to_string(),
                selection.epoch(),
            );
            state.set_saving(true);
            snapshot
        };

        info!(source_id = %config.id, original_id = %original_id, "Saving provider source");
        let outcome = self
            .remote
            .update_source(&config, &original_id)
            .await
            .and_then(ApiResponse::into_result);

        let result = {
            let mut state = self.state.write().await;
            state.set_saving(false);
            match outcome {
                Ok(ack) => {
                    state.commit_save(&original_id, config, epoch);
                    self.notifier
                        .notify(Notice::success(non_empty(ack.message).unwrap_or_else(|| SAVE_SUCCESS.to_string())));
                    Ok(())
                }
                Err(e) => {
                    let message = describe(&e, SAVE_FAILED);
                    warn!(source_id = %original_id, error = %message, "Save failed");
                    state.fail_save(epoch, message.clone());
                    self.notifier.notify(Notice::error(message));
                    Err(e)
                }
            }
        };

        self.reload().await;
        result
    }

    /// Fetch the models the selected source offers. Returns how many.
    ///
    /// Pending edits are saved first; a failed save aborts the fetch.
    pub async fn fetch_available_models(&self) -> Result<usize> {
        let dirty = self
            .state
            .read()
            .await
            .selection()
            .map(|selection| selection.is_dirty())
            .ok_or_else(|| Error::Unavailable(NOTHING_SELECTED.to_string()))?;
        if dirty {
            self.save().await?;
        }

        let (source_id, epoch) = {
            let mut state = self.state.write().await;
            let selection = state
                .selection()
                .ok_or_else(|| Error::Unavailable(NOTHING_SELECTED.to_string()))?;
            let snapshot = (selection.record().id.clone(), selection.epoch());
            state.set_loading_models(true);
            snapshot
        };

        debug!(source_id = %source_id, "Fetching available models");
        let outcome = self
            .remote
            .available_models(&source_id)
            .await
            .and_then(ApiResponse::into_result);

        let mut state = self.state.write().await;
        state.set_loading_models(false);
        match outcome {
            Ok(response) => {
                if !state.is_current(epoch) {
                    debug!(source_id = %source_id, "Selection changed, discarding model list");
                    return Ok(0);
                }
                let count = state.replace_models(response.data.unwrap_or_default());
                info!(source_id = %source_id, count, "Models fetched");
                if count == 0 {
                    self.notifier.notify(Notice::info(NO_MODELS_FOUND));
                }
                Ok(count)
            }
            Err(e) => {
                if state.is_current(epoch) {
                    state.clear_model_metadata();
                }
                drop(state);
                self.notify_error(&e, FETCH_MODELS_FAILED);
                Err(e)
            }
        }
    }

    /// Bind `model` under the selected source, then reload.
    pub async fn add_model_provider(&self, model: &str) -> Result<()> {
        let provider = {
            let state = self.state.read().await;
            let selection = state
                .selection()
                .ok_or_else(|| Error::Unavailable(NOTHING_SELECTED.to_string()))?;
            Provider::for_model(&selection.record().id, model, state.model_metadata(model))
        };

        info!(provider_id = %provider.id, "Adding model");
        let outcome = self
            .remote
            .create_provider(&provider)
            .await
            .and_then(ApiResponse::into_result);

        let result = match outcome {
            Ok(ack) => {
                self.state.write().await.store_mut().push_provider(provider);
                self.notifier.notify(Notice::success(
                    non_empty(ack.message).unwrap_or_else(|| format!("Added model {model}")),
                ));
                Ok(())
            }
            Err(e) => {
                self.notify_error(&e, ADD_MODEL_FAILED);
                Err(e)
            }
        };

        self.reload().await;
        result
    }

    /// Bind the session's manual model id. Clears it on success.
    pub async fn add_manual_model(&self) -> Result<()> {
        let model = {
            let state = self.state.read().await;
            if state.selection().is_none() {
                return Err(Error::Unavailable(NOTHING_SELECTED.to_string()));
            }
            state.manual_model_id().trim().to_string()
        };
        if model.is_empty() {
            return Err(Error::ValidationGap(EMPTY_MODEL_ID.to_string()));
        }

        self.add_model_provider(&model).await?;
        self.state.write().await.set_manual_model_id("");
        Ok(())
    }

    /// Delete a source and its providers after confirmation, then reload.
    ///
    /// Returns false when the user declined.
    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        if !self
            .confirm
            .confirm(&format!("Delete provider source '{id}' and all of its models?"))
            .await
        {
            debug!(source_id = id, "Delete declined");
            return Ok(false);
        }

        info!(source_id = id, "Deleting provider source");
        let outcome = self
            .remote
            .delete_source(id)
            .await
            .and_then(ApiResponse::into_result);

        let result = match outcome {
            Ok(_) => {
                self.state.write().await.forget_source(id);
                self.notifier.notify(Notice::success(DELETE_SOURCE_SUCCESS));
                Ok(true)
            }
            Err(e) => {
                self.notify_error(&e, DELETE_SOURCE_FAILED);
                Err(e)
            }
        };

        self.reload().await;
        result
    }

    /// Delete a provider after confirmation, then reload.
    ///
    /// Returns false when the user declined.
    pub async fn delete_provider(&self, id: &str) -> Result<bool> {
        if !self
            .confirm
            .confirm(&format!("Delete model '{id}'?"))
            .await
        {
            debug!(provider_id = id, "Delete declined");
            return Ok(false);
        }

        info!(provider_id = id, "Deleting model");
        let outcome = self
            .remote
            .delete_provider(id)
            .await
            .and_then(ApiResponse::into_result);

        let result = match outcome {
            Ok(_) => {
                self.state.write().await.store_mut().remove_provider(id);
                self.notifier.notify(Notice::success(DELETE_PROVIDER_SUCCESS));
                Ok(true)
            }
            Err(e) => {
                self.notify_error(&e, DELETE_PROVIDER_FAILED);
                Err(e)
            }
        };

        self.reload().await;
        result
    }

    /// Run a live check against a provider.
    ///
    /// Passes only when the call succeeds and reports no embedded error.
    pub async fn test_provider(&self, id: &str) -> Result<()> {
        self.state.write().await.begin_test(id);

        let outcome = match self.remote.check_provider(id).await {
            Ok(response) if response.is_ok() => match response.data {
                Some(CheckPayload { error: None }) => Ok(()),
                Some(CheckPayload { error: Some(message) }) => Err(Error::RemoteRejected(message)),
                None => Err(Error::RemoteRejected(String::new())),
            },
            Ok(response) => Err(Error::RemoteRejected(
                response.message.unwrap_or_default(),
            )),
            Err(e) => Err(e),
        };

        self.state.write().await.end_test(id);

        match &outcome {
            Ok(()) => {
                info!(provider_id = id, "Model test passed");
                self.notifier
                    .notify(Notice::success(format!("Model {id} is working")));
            }
            Err(e) => {
                warn!(provider_id = id, error = %e, "Model test failed");
                self.notify_error(e, TEST_FAILED);
            }
        }
        outcome
    }

    fn notify_error(&self, error: &Error, fallback: &str) {
        self.notifier.notify(Notice::error(describe(error, fallback)));
    }
}

fn non_empty(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::confirm::AutoConfirm;
    use crate::notify::{NoticeLevel, NoticeQueue};
    use crate::remote::{Failure, InMemoryRemote, RemoteCall};
    use crate::types::ProviderSource;

    fn source(id: &str) -> ProviderSource {
        serde_json::from_value(json!({"id": id, "provider_type": "chat_completion"})).unwrap()
    }

    async fn engine(remote: InMemoryRemote) -> (ProviderSync, Arc<InMemoryRemote>, Arc<NoticeQueue>) {
        let remote = Arc::new(remote);
        let notices = Arc::new(NoticeQueue::new());
        let sync = ProviderSync::new(remote.clone(), notices.clone(), Arc::new(AutoConfirm(true)));
        sync.load_catalog().await.unwrap();
        (sync, remote, notices)
    }

    #[tokio::test]
    async fn save_without_selection_is_unavailable() {
        let (sync, remote, _) = engine(InMemoryRemote::new()).await;
        let err = sync.save().await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(remote.call_count(RemoteCall::UpdateSource).await, 0);
    }

    #[tokio::test]
    async fn save_uses_server_message() {
        let (sync, _, notices) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        sync.select_id("openai").await.unwrap();
        sync.save().await.unwrap();

        assert_eq!(notices.messages(), vec!["provider source updated"]);
    }

    #[tokio::test]
    async fn failed_save_keeps_dirty_and_reports() {
        let (sync, remote, notices) =
            engine(InMemoryRemote::new().with_source(source("openai"))).await;
        sync.select_id("openai").await.unwrap();
        sync.state_mut().await.edit(|s| s.enable = false);
        remote
            .fail_next(RemoteCall::UpdateSource, Failure::Rejected("invalid key".to_string()))
            .await;

        assert!(sync.save().await.is_err());

        let state = sync.state().await;
        assert!(state.is_dirty());
        assert!(!state.is_saving());
        assert_eq!(notices.current().map(|n| n.level), Some(NoticeLevel::Error));
        assert_eq!(notices.messages(), vec!["invalid key"]);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_store() {
        let (sync, remote, _) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        remote
            .fail_next(RemoteCall::TemplateCatalog, Failure::Transport("offline".to_string()))
            .await;

        assert!(sync.load_catalog().await.is_err());
        assert!(sync.state().await.store().source("openai").is_some());
    }

    #[tokio::test]
    async fn catalog_without_data_keeps_previous_store() {
        let (sync, remote, _) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        remote
            .fail_next(RemoteCall::TemplateCatalog, Failure::Empty)
            .await;

        let err = sync.load_catalog().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(sync.state().await.store().sources().len(), 1);
    }

    #[tokio::test]
    async fn unknown_template_notifies() {
        let (sync, _, notices) = engine(InMemoryRemote::new()).await;
        let err = sync.instantiate("Nope").await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(notices.len(), 1);
    }

    #[tokio::test]
    async fn declined_delete_makes_no_call() {
        let remote = Arc::new(InMemoryRemote::new().with_source(source("openai")));
        let sync = ProviderSync::new(
            remote.clone(),
            Arc::new(NoticeQueue::new()),
            Arc::new(AutoConfirm(false)),
        );

        assert!(!sync.delete_source("openai").await.unwrap());
        assert_eq!(remote.call_count(RemoteCall::DeleteSource).await, 0);
        assert_eq!(remote.sources().await.len(), 1);
    }

    #[tokio::test]
    async fn manual_model_requires_an_id() {
        let (sync, remote, _) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        sync.select_id("openai").await.unwrap();
        sync.state_mut().await.set_manual_model_id("   ");

        let err = sync.add_manual_model().await.unwrap_err();
        assert!(matches!(err, Error::ValidationGap(_)));
        assert_eq!(remote.call_count(RemoteCall::CreateProvider).await, 0);
    }

    #[tokio::test]
    async fn manual_model_is_bound_and_cleared() {
        let (sync, remote, _) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        sync.select_id("openai").await.unwrap();
        sync.state_mut().await.set_manual_model_id(" o3 ");

        sync.add_manual_model().await.unwrap();

        assert_eq!(remote.providers().await[0].id, "openai/o3");
        let state = sync.state().await;
        assert_eq!(state.manual_model_id(), "");
        assert!(state.model_already_configured("o3"));
    }

    #[tokio::test]
    async fn empty_model_list_is_reported() {
        let (sync, _, notices) = engine(InMemoryRemote::new().with_source(source("openai"))).await;
        sync.select_id("openai").await.unwrap();

        assert_eq!(sync.fetch_available_models().await.unwrap(), 0);
        assert_eq!(notices.current().map(|n| n.level), Some(NoticeLevel::Info));
        assert!(!sync.state().await.is_loading_models());
    }
}
