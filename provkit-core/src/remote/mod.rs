//! The remote configuration authority.
//!
//! [`RemoteAuthority`] is the narrow interface the sync engine talks to.
//! Every call yields the decoded response envelope; interpreting `status`
//! is the engine's job, so implementations only report transport failures
//! as errors.
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpRemote`] talks to the dashboard HTTP API
//! - [`InMemoryRemote`] keeps the catalog in process, for tests and demos

mod http;
mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http::HttpRemote;
pub use memory::{Failure, InMemoryRemote, RemoteCall};

use crate::types::{ModelMetadata, Provider, ProviderSource, null_as_default};
use crate::{Error, Result};

/// Outcome tag of a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Ok,
    Error,
    #[serde(other)]
    Unknown,
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: ApiStatus::Ok,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ApiStatus::Ok
    }

    /// Turn a non-ok status into [`Error::RemoteRejected`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::RemoteRejected(self.message.unwrap_or_default()))
        }
    }
}

/// Envelope for calls whose payload is ignored.
pub type Ack = ApiResponse<Value>;

impl Ack {
    pub fn done() -> Self {
        Self {
            status: ApiStatus::Ok,
            message: None,
            data: None,
        }
    }
}

/// Payload of the template catalog endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPayload {
    #[serde(default)]
    pub config_schema: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider_sources: Vec<ProviderSource>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub providers: Vec<Provider>,
}

/// Payload of the available-models endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_metadata: HashMap<String, ModelMetadata>,
}

/// Payload of the provider check endpoint.
///
/// A null `error` means the check passed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckPayload {
    #[serde(default)]
    pub error: Option<String>,
}

/// Operations the remote configuration authority offers.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Fetch templates (inside the schema), sources and providers.
    async fn template_catalog(&self) -> Result<ApiResponse<CatalogPayload>>;

    /// Create or rename-and-update a source.
    ///
    /// `original_id` is the id the source had when it was selected, so the
    /// remote side can tell a rename of an existing source from a new one.
    async fn update_source(&self, config: &ProviderSource, original_id: &str) -> Result<Ack>;

    /// Delete a source and its providers.
    async fn delete_source(&self, id: &str) -> Result<Ack>;

    /// List the models a source offers.
    async fn available_models(&self, source_id: &str) -> Result<ApiResponse<ModelsPayload>>;

    /// Bind a new provider.
    async fn create_provider(&self, provider: &Provider) -> Result<Ack>;

    /// Delete a provider.
    async fn delete_provider(&self, id: &str) -> Result<Ack>;

    /// Run a live check against a provider.
    async fn check_provider(&self, id: &str) -> Result<ApiResponse<CheckPayload>>;
}
