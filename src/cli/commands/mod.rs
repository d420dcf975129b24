//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod list;

use anyhow::Result;
use clap::Subcommand;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the packages that changed since their last build
    Build {
        /// Packages to build, by directory or name (all when omitted)
        packages: Vec<String>,

        /// Only build packages on the way to these packages
        #[arg(long, value_name = "PACKAGE")]
        upto: Vec<String>,

        /// Build the selected packages even if they did not change
        #[arg(short, long)]
        force: bool,

        /// Print the build order without building
        #[arg(long)]
        dry_run: bool,

        /// Switch on an option declared in .biltrc.toml
        #[arg(long, value_name = "OPTION")]
        enable: Vec<String>,

        /// Switch off an option declared in .biltrc.toml
        #[arg(long, value_name = "OPTION")]
        disable: Vec<String>,
    },

    /// List the packages of the repository
    List,
}

impl Commands {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Self::Build {
                packages,
                upto,
                force,
                dry_run,
                enable,
                disable,
            } => {
                let current_dir = std::env::current_dir()?;
                let options = build::BuildOptions {
                    packages,
                    upto,
                    force,
                    dry_run,
                    enable,
                    disable,
                };
                build::execute(&current_dir, options).await
            }
            Self::List => {
                let current_dir = std::env::current_dir()?;
                list::execute(&current_dir).await
            }
        }
    }
}
