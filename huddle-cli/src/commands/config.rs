//! Config command for inspecting configuration

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the merged configuration
    Show,
    /// Show config file locations
    Path,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = ConfigLoader::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommand::Path => {
            match ConfigLoader::user_config_path() {
                Some(path) => println!("User:    {}", path.display()),
                None => println!("User:    (unavailable)"),
            }
            println!("Project: {}", ConfigLoader::project_config_path().display());
        }
    }
    Ok(())
}
