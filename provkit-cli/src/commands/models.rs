//! Model binding commands.
//!
//! Lists the merged view of configured and offered models for a source,
//! binds new models and runs live checks.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color};
use provkit_core::{ModelEntry, ModelMetadata};

use super::{table, yes_no};
use crate::session::{SessionOptions, connect};

#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommands {
    /// List configured and available models of a source
    List {
        /// Source id
        source: String,

        /// Only show models whose name or id contains this term
        #[arg(long)]
        search: Option<String>,

        /// Skip asking the source for its model list
        #[arg(long)]
        configured: bool,
    },
    /// Bind a model under a source
    Add {
        /// Source id
        source: String,

        /// Model name as the source reports it
        model: String,

        /// Fetch model metadata first so capabilities and context limit are filled in
        #[arg(long)]
        fetch: bool,
    },
    /// Remove a bound model
    Remove {
        /// Provider id (<source>/<model>)
        provider_id: String,
    },
    /// Run a live check against a bound model
    Test {
        /// Provider id (<source>/<model>)
        provider_id: String,
    },
}

pub async fn run(args: ModelsArgs, options: &SessionOptions) -> Result<()> {
    match args.command {
        ModelsCommands::List {
            source,
            search,
            configured,
        } => list_models(options, &source, search, configured).await,
        ModelsCommands::Add {
            source,
            model,
            fetch,
        } => add_model(options, &source, &model, fetch).await,
        ModelsCommands::Remove { provider_id } => remove_model(options, &provider_id).await,
        ModelsCommands::Test { provider_id } => test_model(options, &provider_id).await,
    }
}

async fn list_models(
    options: &SessionOptions,
    source: &str,
    search: Option<String>,
    configured_only: bool,
) -> Result<()> {
    let sync = connect(options).await?;
    sync.select_id(source).await?;
    if !configured_only {
        sync.fetch_available_models().await?;
    }

    let mut state = sync.state_mut().await;
    if let Some(term) = search {
        state.set_model_search(term);
    }
    let entries = state.filtered_model_entries();

    if entries.is_empty() {
        if state.model_search().is_empty() {
            println!("No models for source {source}.");
        } else {
            println!("No models match '{}'.", state.model_search());
        }
        return Ok(());
    }

    let mut table = table(&["Status", "Model", "Provider", "Enabled", "Context", "Capabilities"]);
    for entry in &entries {
        let (status, provider, enabled) = match entry {
            ModelEntry::Configured { provider, .. } => (
                Cell::new("configured").fg(Color::Green),
                provider.id.clone(),
                yes_no(provider.enable),
            ),
            ModelEntry::Available { .. } => (Cell::new("available"), "-".to_string(), "-"),
        };
        let metadata = entry.metadata();
        table.add_row(vec![
            status,
            Cell::new(entry.model_name().unwrap_or("-")),
            Cell::new(provider),
            Cell::new(enabled),
            Cell::new(
                metadata
                    .and_then(ModelMetadata::format_context_limit)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format_capabilities(metadata)),
        ]);
    }

    println!("{table}");
    Ok(())
}

async fn add_model(options: &SessionOptions, source: &str, model: &str, fetch: bool) -> Result<()> {
    let sync = connect(options).await?;
    sync.select_id(source).await?;

    {
        let mut state = sync.state_mut().await;
        if state.model_already_configured(model) {
            bail!("Model '{}' is already configured under {}", model, source);
        }
        state.set_manual_model_id(model);
    }

    if fetch {
        sync.fetch_available_models().await?;
    }

    sync.add_manual_model().await?;
    Ok(())
}

async fn remove_model(options: &SessionOptions, provider_id: &str) -> Result<()> {
    let sync = connect(options).await?;
    if sync.state().await.store().provider(provider_id).is_none() {
        bail!("Model '{}' not found", provider_id);
    }

    if !sync.delete_provider(provider_id).await? {
        println!("Cancelled.");
    }
    Ok(())
}

async fn test_model(options: &SessionOptions, provider_id: &str) -> Result<()> {
    let sync = connect(options).await?;
    if sync.state().await.store().provider(provider_id).is_none() {
        bail!("Model '{}' not found", provider_id);
    }

    sync.test_provider(provider_id).await?;
    Ok(())
}

/// Comma-separated capability tags, `-` without metadata.
fn format_capabilities(metadata: Option<&ModelMetadata>) -> String {
    let Some(meta) = metadata else {
        return "-".to_string();
    };
    let mut caps = Vec::new();
    if meta.supports_image_input() {
        caps.push("vision");
    }
    if meta.supports_tool_call() {
        caps.push("tools");
    }
    if meta.supports_reasoning() {
        caps.push("reasoning");
    }
    if caps.is_empty() {
        "text".to_string()
    } else {
        caps.join(", ")
    }
}
