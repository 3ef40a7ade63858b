//! Provider template listing.

use anyhow::Result;
use clap::Args;
use comfy_table::Cell;

use super::table;
use crate::session::{SessionOptions, connect};

#[derive(Args, Debug)]
pub struct TemplatesArgs {
    /// List templates of every provider type, not just the active tab
    #[arg(long)]
    pub all: bool,
}

pub async fn run(args: TemplatesArgs, options: &SessionOptions) -> Result<()> {
    let sync = connect(options).await?;
    let state = sync.state().await;
    let templates = state.store().templates();

    let keys: Vec<String> = if args.all {
        templates.keys().cloned().collect()
    } else {
        state
            .available_source_types()
            .into_iter()
            .map(|choice| choice.key)
            .collect()
    };

    if keys.is_empty() {
        println!(
            "No templates for provider type {}.",
            state.provider_type().as_str()
        );
        return Ok(());
    }

    let mut table = table(&["Template", "Provider type", "Adapter", "Default id"]);
    for key in keys {
        let Some(template) = templates.get(&key) else {
            continue;
        };
        table.add_row(vec![
            Cell::new(&key),
            Cell::new(
                template
                    .provider_type
                    .as_ref()
                    .map(|ty| ty.as_str())
                    .unwrap_or("-"),
            ),
            Cell::new(template.adapter.as_deref().unwrap_or("-")),
            Cell::new(template.id.as_deref().unwrap_or(&key)),
        ]);
    }

    println!("{table}");
    Ok(())
}
