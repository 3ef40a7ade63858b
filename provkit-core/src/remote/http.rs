//! Dashboard HTTP API client.
//!
//! # Example
//!
//! ```ignore
//! use provkit_core::remote::HttpRemote;
//!
//! let remote = HttpRemote::new("http://localhost:6185");
//! let catalog = remote.template_catalog().await?;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::{Ack, ApiResponse, CatalogPayload, CheckPayload, ModelsPayload, RemoteAuthority};
use crate::types::{Provider, ProviderSource};
use crate::{Error, Result};

const TEMPLATE_PATH: &str = "/api/config/provider/template";
const SOURCE_UPDATE_PATH: &str = "/api/config/provider_sources/update";
const SOURCE_DELETE_PATH: &str = "/api/config/provider_sources/delete";
const SOURCE_MODELS_PATH: &str = "/api/config/provider_sources/models";
const PROVIDER_NEW_PATH: &str = "/api/config/provider/new";
const PROVIDER_DELETE_PATH: &str = "/api/config/provider/delete";
const PROVIDER_CHECK_PATH: &str = "/api/config/provider/check_one";

/// [`RemoteAuthority`] backed by the dashboard HTTP API.
///
/// Authentication is the client's concern: build a [`reqwest::Client`] with
/// default headers and hand it to [`HttpRemote::with_client`].
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Create a remote with a default client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a remote with a preconfigured client.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        decode(response).await
    }
}

/// Decode an envelope, turning HTTP failures into errors.
///
/// A failed response whose body is an envelope with a message is reported
/// as that message; anything else is a transport failure.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiResponse<Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .filter(|message| !message.trim().is_empty());
        return Err(match message {
            Some(message) => Error::RemoteRejected(message),
            None => Error::Transport(format!("request failed with status {status}")),
        });
    }

    response
        .json()
        .await
        .map_err(|e| Error::Transport(e.to_string()))
}

#[async_trait]
impl RemoteAuthority for HttpRemote {
    async fn template_catalog(&self) -> Result<ApiResponse<CatalogPayload>> {
        self.get(TEMPLATE_PATH, &[]).await
    }

    async fn update_source(&self, config: &ProviderSource, original_id: &str) -> Result<Ack> {
        self.post(
            SOURCE_UPDATE_PATH,
            &json!({ "config": config, "original_id": original_id }),
        )
        .await
    }

    async fn delete_source(&self, id: &str) -> Result<Ack> {
        self.post(SOURCE_DELETE_PATH, &json!({ "id": id })).await
    }

    async fn available_models(&self, source_id: &str) -> Result<ApiResponse<ModelsPayload>> {
        self.get(SOURCE_MODELS_PATH, &[("source_id", source_id)])
            .await
    }

    async fn create_provider(&self, provider: &Provider) -> Result<Ack> {
        self.post(PROVIDER_NEW_PATH, provider).await
    }

    async fn delete_provider(&self, id: &str) -> Result<Ack> {
        self.post(PROVIDER_DELETE_PATH, &json!({ "id": id })).await
    }

    async fn check_provider(&self, id: &str) -> Result<ApiResponse<CheckPayload>> {
        self.get(PROVIDER_CHECK_PATH, &[("id", id)]).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::remote::ApiStatus;

    #[test]
    fn trailing_slash_is_trimmed() {
        let remote = HttpRemote::new("http://localhost:6185/");
        assert_eq!(remote.base_url(), "http://localhost:6185");
        assert_eq!(
            remote.url(TEMPLATE_PATH),
            "http://localhost:6185/api/config/provider/template"
        );
    }

    #[tokio::test]
    async fn catalog_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEMPLATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": {
                    "config_schema": {"provider": {"config_template": {}}},
                    "provider_sources": [{"id": "openai"}],
                    "providers": [],
                },
            })))
            .mount(&server)
            .await;

        let remote = HttpRemote::new(server.uri());
        let response = remote.template_catalog().await.unwrap();

        assert_eq!(response.status, ApiStatus::Ok);
        let payload = response.data.unwrap();
        assert_eq!(payload.provider_sources[0].id, "openai");
    }

    #[tokio::test]
    async fn update_sends_config_and_original_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SOURCE_UPDATE_PATH))
            .and(body_json(json!({
                "config": {"id": "renamed", "enable": true},
                "original_id": "openai",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "message": "saved"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let remote = HttpRemote::new(server.uri());
        let ack = remote
            .update_source(&ProviderSource::new("renamed"), "openai")
            .await
            .unwrap();

        assert!(ack.is_ok());
        assert_eq!(ack.message.as_deref(), Some("saved"));
    }

    #[tokio::test]
    async fn models_query_uses_source_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SOURCE_MODELS_PATH))
            .and(query_param("source_id", "openai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": {"models": ["gpt-4o"], "model_metadata": {}},
            })))
            .mount(&server)
            .await;

        let remote = HttpRemote::new(server.uri());
        let models = remote.available_models("openai").await.unwrap();
        assert_eq!(models.data.unwrap().models, vec!["gpt-4o"]);
    }

    #[tokio::test]
    async fn http_error_with_envelope_is_rejected_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PROVIDER_DELETE_PATH))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"status": "error", "message": "provider is in use"})),
            )
            .mount(&server)
            .await;

        let remote = HttpRemote::new(server.uri());
        let err = remote.delete_provider("openai/gpt-4o").await.unwrap_err();
        assert!(matches!(err, Error::RemoteRejected(ref m) if m == "provider is in use"));
    }

    #[tokio::test]
    async fn http_error_without_envelope_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROVIDER_CHECK_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let remote = HttpRemote::new(server.uri());
        let err = remote.check_provider("openai/gpt-4o").await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m.contains("502")));
    }
}
