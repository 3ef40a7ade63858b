//! Wiring of a [`ProviderSync`] session for one CLI invocation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dialoguer::{Confirm as Prompt, theme::ColorfulTheme};
use provkit_core::{
    AutoConfirm, Confirm, HttpRemote, Notice, NoticeLevel, Notifier, ProviderSync,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::{ConfigLoader, RemoteConfig};

/// Options shared by every command that talks to the dashboard.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Overrides `remote.base_url`
    pub api_base: Option<String>,
    /// Provider type tab; falls back to `session.default_tab`
    pub tab: Option<String>,
    /// Skip confirmation prompts
    pub assume_yes: bool,
}

/// Load config, build the remote and fetch the catalog.
pub async fn connect(options: &SessionOptions) -> Result<ProviderSync> {
    let mut config = ConfigLoader::load()?;
    if let Some(api_base) = &options.api_base {
        config.remote.base_url = api_base.clone();
    }

    let client = build_client(&config.remote)?;
    let remote = HttpRemote::with_client(&config.remote.base_url, client);
    debug!(base_url = remote.base_url(), "Connecting to dashboard");

    let confirm: Arc<dyn Confirm> = if options.assume_yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(PromptConfirm)
    };

    let tab = options
        .tab
        .as_deref()
        .or(config.session.default_tab.as_deref())
        .unwrap_or_default();

    let sync = ProviderSync::new(Arc::new(remote), Arc::new(ConsoleNotifier), confirm)
        .with_default_tab(tab);
    sync.load_catalog().await.with_context(|| {
        format!(
            "Failed to load provider catalog from {}",
            config.remote.base_url
        )
    })?;
    Ok(sync)
}

fn build_client(remote: &RemoteConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &remote.token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Configured token is not a valid header value")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(remote.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Prints notices to the terminal.
///
/// Error notices go to the debug log only: the failing command returns the
/// same error and it is printed once on exit.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", notice.message),
            NoticeLevel::Warning => eprintln!("Warning: {}", notice.message),
            NoticeLevel::Error => debug!(message = %notice.message, "Error notice"),
        }
    }
}

/// Asks on the terminal. Declines when there is no terminal to ask on.
pub struct PromptConfirm;

#[async_trait]
impl Confirm for PromptConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            Prompt::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}
