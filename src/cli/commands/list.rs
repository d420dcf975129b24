//! List command implementation
//!
//! Implements `bilt list` to show the discovered packages and their
//! dependencies inside the repository.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::output::{status, OutputConfig};
use crate::core::config::{find_config, BiltConfig};
use crate::core::graph::build_graph;
use crate::core::package::PackageInfo;
use crate::infra::discovery::discover;

/// Execute the list command
pub async fn execute(current_dir: &Path) -> Result<()> {
    let output = OutputConfig::global();

    let config_path = find_config(current_dir)?;
    let root = config_path
        .parent()
        .context("Configuration file has no parent directory")?;
    let config = BiltConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let workspace = discover(root, &config).context("Failed to discover packages")?;

    if output.json {
        let packages: Vec<&PackageInfo> = workspace.package_infos.values().collect();
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }
    if output.quiet {
        return Ok(());
    }

    if workspace.package_infos.is_empty() {
        println!("{} No packages found under {}", status::INFO, root.display());
        return Ok(());
    }

    for info in workspace.package_infos.values() {
        println!("{} ({})", info.name, info.directory());
        for dep in &info.dependencies {
            let name = workspace
                .package_infos
                .get(&dep.directory)
                .map_or(dep.directory.as_str(), |d| d.name.as_str());
            println!("  └─ {name}");
        }
    }

    let (_, snipped) = build_graph(&workspace.package_infos);
    for edge in snipped {
        println!("{} Dependency cycle: ignoring {edge}", status::WARNING);
    }

    Ok(())
}
