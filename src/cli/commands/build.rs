//! Build command implementation
//!
//! Implements `bilt build`: discovers the packages, works out which of them
//! changed since their last build, and builds those plus everything that
//! depends on them, dependencies first.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cli::output::{status, OutputConfig, ProgressObserver};
use crate::core::build_order::calculate_build_order;
use crate::core::changes::{find_changed_files, find_latest_package_changes};
use crate::core::config::{find_config, BiltConfig};
use crate::core::dirty::{calculate_build_times, WorkspaceHashes};
use crate::core::executor::{self, BuildPackageResult, BuildResult, TracingObserver};
use crate::core::marker::{MarkerRecorder, MarkerStore};
use crate::core::package::{current_timestamp, Package, PackageInfoWithBuildTime, PackageInfosWithBuildTime};
use crate::core::packages_to_build::calculate_packages_to_build;
use crate::core::phases::{DryRunBuilder, PhaseBuilder, PhaseRunner};
use crate::core::selection::resolve_selectors;
use crate::error::BiltError;
use crate::infra::discovery::{discover, Workspace};
use crate::infra::filesystem::hash_files;
use crate::infra::git::GitRepository;

/// Build options
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Packages to build (directories or names); all when empty
    pub packages: Vec<String>,
    /// Stop at these packages (directories or names); all when empty
    pub upto: Vec<String>,
    /// Rebuild regardless of markers
    pub force: bool,
    /// Print the build order without running anything
    pub dry_run: bool,
    /// Options to switch on
    pub enable: Vec<String>,
    /// Options to switch off
    pub disable: Vec<String>,
}

#[derive(Serialize)]
struct BuildReport<'a> {
    dry_run: bool,
    results: &'a [BuildPackageResult],
}

/// Execute the build command
#[allow(clippy::too_many_lines)]
pub async fn execute(current_dir: &Path, options: BuildOptions) -> Result<()> {
    let output = OutputConfig::global();

    let config_path = find_config(current_dir)?;
    let root = config_path
        .parent()
        .context("Configuration file has no parent directory")?
        .to_path_buf();
    let config = BiltConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let option_values = config.resolve_options(&options.enable, &options.disable)?;

    let workspace = discover(&root, &config).context("Failed to discover packages")?;
    let base = resolve_selectors(&options.packages, current_dir, &root, &workspace.package_infos)?;
    let upto = resolve_selectors(&options.upto, current_dir, &root, &workspace.package_infos)?;

    let git = match GitRepository::open(&root).await {
        Ok(git) => Some(git),
        Err(e) => {
            tracing::warn!("{e}; building everything");
            None
        }
    };

    let store = MarkerStore::new(&root);
    let timed = match &git {
        Some(git) => package_build_times(&workspace, git, &store, config.history_depth).await?,
        None => without_build_times(&workspace),
    };

    let to_build = calculate_packages_to_build(&timed, &base, &upto, options.force);
    for edge in &to_build.snipped {
        tracing::debug!("Ignoring dependency {edge} to break a cycle");
    }
    for warning in &to_build.warnings {
        if !output.quiet {
            eprintln!("{} {warning}", status::WARNING);
        }
    }

    if to_build.package_infos.is_empty() {
        if output.json {
            print_report(&[], options.dry_run)?;
        } else if !output.quiet {
            println!("{} Nothing to build", status::SUCCESS);
        }
        return Ok(());
    }

    let order = calculate_build_order(&to_build.package_infos);

    if options.dry_run {
        let mut builder = DryRunBuilder::default();
        let results = executor::build(&to_build.package_infos, &order, &mut builder, &TracingObserver).await?;
        if output.json {
            print_report(&results, true)?;
        } else if !output.quiet {
            println!("{} Would build {} packages:", status::INFO, builder.visited.len());
            for (i, package) in builder.visited.iter().enumerate() {
                println!("  {}. {package}", i + 1);
            }
        }
        return Ok(());
    }

    let runner = PhaseRunner::new(&root, &config, option_values, &workspace.manifests);
    runner.run_before().await.context("Before phase failed")?;

    let recorder = match &git {
        Some(git) => Some(MarkerRecorder::new(store, git).await?),
        None => None,
    };
    let mut builder = PhaseBuilder::new(&runner, recorder.as_ref());
    let observer = ProgressObserver::new(order.len(), output);
    let results = executor::build(&to_build.package_infos, &order, &mut builder, &observer).await?;
    observer.finish();

    let count = |wanted: BuildResult| results.iter().filter(|r| r.build_result == wanted).count();
    let built = count(BuildResult::Success);
    let failed = count(BuildResult::Failure);
    let not_built = count(BuildResult::NotBuilt);

    let after = runner.run_after(built, failed).await;

    if output.json {
        print_report(&results, false)?;
    } else if !output.quiet {
        println!();
        println!("{} {built} built", status::SUCCESS);
        if failed > 0 {
            println!("{} {failed} failed", status::ERROR);
        }
        if not_built > 0 {
            println!("{} {not_built} not built", status::WARNING);
        }
    }

    after.context("After phase failed")?;
    if failed > 0 {
        bail!("{failed} of {} packages failed to build", results.len());
    }
    Ok(())
}

/// Attach the time of each package's last still-valid build
async fn package_build_times(
    workspace: &Workspace,
    git: &GitRepository,
    store: &MarkerStore,
    history_depth: usize,
) -> Result<PackageInfosWithBuildTime, BiltError> {
    let packages: Vec<Package> = workspace
        .package_infos
        .values()
        .map(|info| info.package.clone())
        .collect();

    let history = git.history(history_depth).await?;
    let uncommitted = git.uncommitted_files().await?;
    let changes = find_latest_package_changes(&packages, &uncommitted, &history, current_timestamp());

    let markers = store.load_all(&packages)?;

    let mut workspace_hashes: BTreeMap<String, WorkspaceHashes> = BTreeMap::new();
    for package in &packages {
        let files = find_changed_files(package, &uncommitted);
        if !files.is_empty() {
            workspace_hashes.insert(package.directory.clone(), hash_files(git.root(), files)?);
        }
    }

    Ok(calculate_build_times(
        &workspace.package_infos,
        &markers,
        &changes,
        &workspace_hashes,
    ))
}

fn without_build_times(workspace: &Workspace) -> PackageInfosWithBuildTime {
    workspace
        .package_infos
        .iter()
        .map(|(dir, info)| {
            (
                dir.clone(),
                PackageInfoWithBuildTime {
                    info: info.clone(),
                    last_build_time: None,
                },
            )
        })
        .collect()
}

fn print_report(results: &[BuildPackageResult], dry_run: bool) -> Result<()> {
    let report = BuildReport { dry_run, results };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
