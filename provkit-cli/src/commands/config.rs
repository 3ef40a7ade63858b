//! `provkit config`: inspect the layered configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings after layering (token masked)
    Show,
    /// Print where the user and project config files are read from
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => print_effective(),
        ConfigCommands::Path => print_locations(),
    }
}

fn print_effective() -> Result<()> {
    let effective = ConfigLoader::load()?.redacted();
    print!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}

fn print_locations() -> Result<()> {
    match ConfigLoader::user_config_path() {
        Some(path) => println!("User:    {}", path.display()),
        None => println!("User:    (no home directory)"),
    }
    let project = ConfigLoader::project_config_path();
    let marker = if project.exists() { "" } else { " (not present)" };
    println!("Project: {}{marker}", project.display());
    Ok(())
}
