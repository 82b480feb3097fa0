use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use super::demo::DemoCommand;
use crate::config::ShellConfig;
use crate::version;

/// appshell - dialogs, events and navigation for a mobile web shell
#[derive(Parser)]
#[command(
    name = "appshell",
    version,
    about = "Dialogs, events and navigation for a mobile web shell",
    long_about = r#"appshell drives the shell services headlessly: the event bus, the dialog
manager, storage, navigation and update checks.

Examples:
  appshell                          # Run the scripted dialog demo
  appshell demo --settle-ms 0       # Same, without animation delays
  appshell --config shell.json config"#
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Config file to use instead of the default locations
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted dialog session and print the visible list after each step
    Demo(DemoCommand),

    /// Print the effective configuration
    Config,

    /// Print version information
    Version,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        match self.command {
            Some(Commands::Version) => {
                println!("{}", version::build_info());
                Ok(())
            }
            Some(Commands::Config) => {
                let config = ShellConfig::init(self.config).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            Some(Commands::Demo(demo)) => {
                let config = ShellConfig::init(self.config).await?;
                demo.execute(&config).await
            }
            None => {
                let config = ShellConfig::init(self.config).await?;
                DemoCommand::default().execute(&config).await
            }
        }
    }
}
