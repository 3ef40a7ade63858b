//! Provider source commands.
//!
//! Every mutating subcommand selects a source, edits the selection through
//! the basic or advanced view and saves it; the dashboard is the source of
//! truth, so the session is rebuilt on the next invocation.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use provkit_core::{BasicField, Error, SessionState, SourceKey};
use serde_json::Value;

use super::{table, yes_no};
use crate::session::{SessionOptions, connect};

#[derive(Args, Debug)]
pub struct SourcesArgs {
    #[command(subcommand)]
    pub command: SourcesCommands,
}

#[derive(Subcommand, Debug)]
pub enum SourcesCommands {
    /// List provider sources of the active tab
    List,
    /// Show the fields of a provider source
    Show {
        /// Source id
        id: String,

        /// Also show provider-specific fields
        #[arg(long)]
        advanced: bool,
    },
    /// Create a provider source from a template
    Add {
        /// Template key (see `provkit templates`)
        template: String,

        /// Field assignments applied before saving, e.g. --set key=sk-...
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },
    /// Change one field of a provider source and save it
    Set {
        /// Source id
        id: String,

        /// Field name (id, key, api_base or any provider-specific field)
        field: String,

        /// New value; parsed as JSON when possible, otherwise a string
        value: String,
    },
    /// Delete a provider source and all of its models
    Delete {
        /// Source id
        id: String,
    },
}

pub async fn run(args: SourcesArgs, options: &SessionOptions) -> Result<()> {
    match args.command {
        SourcesCommands::List => list_sources(options).await,
        SourcesCommands::Show { id, advanced } => show_source(options, &id, advanced).await,
        SourcesCommands::Add { template, fields } => add_source(options, &template, &fields).await,
        SourcesCommands::Set { id, field, value } => {
            set_field(options, &id, &field, parse_value(&value)).await
        }
        SourcesCommands::Delete { id } => delete_source(options, &id).await,
    }
}

async fn list_sources(options: &SessionOptions) -> Result<()> {
    let sync = connect(options).await?;
    let state = sync.state().await;
    let sources = state.displayed_sources();

    if sources.is_empty() {
        println!(
            "No provider sources for provider type {}.",
            state.provider_type().as_str()
        );
        println!();
        println!("Create one with: provkit sources add <template>");
    } else {
        let mut table = table(&["ID", "Adapter", "API base", "Enabled", "Models"]);
        for source in sources {
            let models = state.store().providers_for_source(&source.id).len();
            table.add_row(vec![
                Cell::new(&source.id),
                Cell::new(source.adapter.as_deref().unwrap_or("-")),
                Cell::new(source.api_base.as_deref().unwrap_or("-")),
                Cell::new(yes_no(source.enable)),
                Cell::new(models),
            ]);
        }
        println!("{table}");
    }

    // Non-chat tabs also list their providers directly
    let providers = state.filtered_providers();
    if !providers.is_empty() {
        println!();
        let mut table = table(&["Provider", "Source", "Model", "Enabled"]);
        for provider in providers {
            table.add_row(vec![
                Cell::new(&provider.id),
                Cell::new(provider.source_id.as_deref().unwrap_or("-")),
                Cell::new(provider.model.as_deref().unwrap_or("-")),
                Cell::new(yes_no(provider.enable)),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}

async fn show_source(options: &SessionOptions, id: &str, advanced: bool) -> Result<()> {
    let sync = connect(options).await?;
    sync.select_id(id).await?;

    let mut state = sync.state_mut().await;
    if let Some(basic) = state.basic_view() {
        println!("ID:       {}", basic.id());
        println!("Key:      {}", describe_key(basic.key()));
        println!("API base: {}", basic.api_base().unwrap_or("(not set)"));
    }

    let models = state.source_providers().len();
    println!("Models:   {models}");

    if advanced && let Some(view) = state.advanced_view() {
        println!();
        if view.is_empty() {
            println!("No provider-specific fields.");
        } else {
            let mut table = table(&["Field", "Value"]);
            for name in view.keys() {
                let value = view.get(&name).map(Value::to_string).unwrap_or_default();
                table.add_row(vec![Cell::new(&name), Cell::new(value)]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

async fn add_source(options: &SessionOptions, template: &str, fields: &[String]) -> Result<()> {
    let assignments = fields
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;

    let sync = connect(options).await?;
    let id = sync.instantiate(template).await?;

    {
        let mut state = sync.state_mut().await;
        for (name, value) in assignments {
            apply_field(&mut state, &name, value)
                .with_context(|| format!("Cannot set field '{name}'"))?;
        }
    }

    sync.save().await?;
    let saved_id = sync
        .state()
        .await
        .selected_id()
        .map(str::to_string)
        .unwrap_or(id);
    println!("Run 'provkit models list {saved_id}' to see the models it offers.");
    Ok(())
}

async fn set_field(options: &SessionOptions, id: &str, field: &str, value: Value) -> Result<()> {
    let sync = connect(options).await?;
    sync.select_id(id).await?;

    {
        let mut state = sync.state_mut().await;
        apply_field(&mut state, field, value)
            .with_context(|| format!("Cannot set field '{field}'"))?;
        if !state.is_dirty() {
            println!("Field '{field}' already has that value.");
            return Ok(());
        }
    }

    sync.save().await?;
    Ok(())
}

async fn delete_source(options: &SessionOptions, id: &str) -> Result<()> {
    let sync = connect(options).await?;
    if sync.state().await.store().source(id).is_none() {
        bail!("Provider source '{}' not found", id);
    }

    if !sync.delete_source(id).await? {
        println!("Cancelled.");
    }
    Ok(())
}

/// Route a field write to the basic or the advanced view.
fn apply_field(state: &mut SessionState, name: &str, value: Value) -> provkit_core::Result<()> {
    let nothing_selected = || Error::Unavailable("no provider source is selected".to_string());
    match BasicField::from_name(name) {
        Some(field) => state
            .basic_view()
            .ok_or_else(nothing_selected)?
            .set(field, value),
        None => state
            .advanced_view()
            .ok_or_else(nothing_selected)?
            .set(name, value),
    }
}

/// Parse a command-line value: JSON if it parses, a plain string otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Expected FIELD=VALUE, got '{}'", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing field name in '{}'", raw);
    }
    Ok((name.to_string(), parse_value(value)))
}

/// Key summary that never prints key material.
fn describe_key(key: Option<&SourceKey>) -> String {
    match key {
        None => "(not set)".to_string(),
        Some(key) if key.is_blank() => "(not set)".to_string(),
        Some(SourceKey::Single(_)) => "********".to_string(),
        Some(SourceKey::Many(keys)) => format!("{} keys", keys.len()),
    }
}

#[cfg(test)]
mod tests {
    use provkit_core::{ProviderSource, SourceChoice};
    use serde_json::json;

    use super::*;

    fn selected(id: &str) -> SessionState {
        let mut state = SessionState::new();
        state
            .select(Some(SourceChoice::Source(ProviderSource::new(id))))
            .unwrap();
        state
    }

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("120"), json!(120));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value(r#"["a","b"]"#), json!(["a", "b"]));
        assert_eq!(parse_value("null"), Value::Null);
    }

    #[test]
    fn test_parse_value_falls_back_to_string() {
        assert_eq!(parse_value("sk-abc"), json!("sk-abc"));
        assert_eq!(
            parse_value("https://api.openai.com/v1"),
            json!("https://api.openai.com/v1")
        );
    }

    #[test]
    fn test_parse_assignment() {
        let (name, value) = parse_assignment("timeout=30").unwrap();
        assert_eq!(name, "timeout");
        assert_eq!(value, json!(30));

        let (name, value) = parse_assignment("api_base=http://x/v1?a=b").unwrap();
        assert_eq!(name, "api_base");
        assert_eq!(value, json!("http://x/v1?a=b"));

        assert!(parse_assignment("timeout").is_err());
        assert!(parse_assignment("=30").is_err());
    }

    #[test]
    fn test_describe_key_hides_material() {
        assert_eq!(describe_key(None), "(not set)");
        assert_eq!(describe_key(Some(&SourceKey::from(""))), "(not set)");
        assert_eq!(describe_key(Some(&SourceKey::from("sk-live"))), "********");
        let many = SourceKey::Many(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(describe_key(Some(&many)), "2 keys");
    }

    #[test]
    fn test_apply_field_basic_marks_dirty() {
        let mut state = selected("openai");
        apply_field(&mut state, "api_base", json!("https://example.com/v1")).unwrap();

        assert!(state.is_dirty());
        assert_eq!(
            state.editable().unwrap().api_base.as_deref(),
            Some("https://example.com/v1")
        );
    }

    #[test]
    fn test_apply_field_advanced() {
        let mut state = selected("openai");
        apply_field(&mut state, "timeout", json!(60)).unwrap();

        assert!(state.is_dirty());
        assert_eq!(state.editable().unwrap().extra.get("timeout"), Some(&json!(60)));
    }

    #[test]
    fn test_apply_field_rejects_managed_field() {
        let mut state = selected("openai");
        let err = apply_field(&mut state, "provider_type", json!("rerank")).unwrap_err();
        assert!(matches!(err, Error::InvalidField { .. }));
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_apply_field_without_selection() {
        let mut state = SessionState::new();
        let err = apply_field(&mut state, "id", json!("x")).unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
