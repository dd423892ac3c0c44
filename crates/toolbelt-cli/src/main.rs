mod flows;
mod render;
mod restorer;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use toolbelt_installer::{default_user_root, StoreLayout};

#[derive(Parser, Debug)]
#[command(name = "toolbelt")]
#[command(about = "Lifecycle manager for installable command-line tool packages", long_about = None)]
struct Cli {
    /// Override the toolbelt root directory.
    #[arg(long)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a tool package and expose its commands.
    Install {
        /// Package id, optionally with a version requirement: `name@^1.2`.
        spec: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        framework: Option<String>,
        /// Package source: a feed directory or an http(s) feed base url.
        #[arg(long)]
        source: Option<String>,
        /// Path to a feeds.toml listing package sources.
        #[arg(long)]
        feed_config: Option<PathBuf>,
        /// Install into the shared package cache instead of the store.
        #[arg(long)]
        cached: bool,
        #[arg(long)]
        quiet: bool,
    },
    /// Remove an installed tool package and its commands.
    Uninstall {
        package: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// List installed tool packages and their commands.
    List,
    /// Print the directories toolbelt uses.
    Doctor,
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => default_user_root()?,
    };
    let layout = StoreLayout::new(root);

    match cli.command {
        Commands::Install {
            spec,
            version,
            framework,
            source,
            feed_config,
            cached,
            quiet,
        } => flows::install_flow(
            &layout,
            flows::InstallRequest {
                spec,
                version,
                framework,
                source,
                feed_config,
                cached,
                quiet,
            },
        ),
        Commands::Uninstall { package, version } => {
            flows::uninstall_flow(&layout, &package, version.as_deref())
        }
        Commands::List => flows::list_flow(&layout),
        Commands::Doctor => flows::doctor_flow(&layout),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
