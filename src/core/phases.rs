//! Build phase runner
//!
//! Runs the configured steps of the three phases. The before phase runs once
//! in the root before any package, the during phase runs in each package
//! directory as the executor's build callback, and the after phase runs once
//! in the root at the end. Within a phase the first failing step stops the
//! phase.

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{ENV_BUILT_COUNT, ENV_FAILED_COUNT, ENV_PACKAGE_DIR, ENV_PACKAGE_NAME, ENV_ROOT};
use crate::core::config::{substitute_vars, BiltConfig, Phase, StepCondition, StepConfig};
use crate::core::executor::{BuildOutcome, PackageBuilder};
use crate::core::manifest::Manifest;
use crate::core::marker::MarkerRecorder;
use crate::core::package::{Package, PackageInfo, ROOT_DIRECTORY};
use crate::error::StepError;
use crate::infra::process::{run_step, StepCommand};

/// Runs phase steps for one invocation
#[derive(Debug)]
pub struct PhaseRunner<'a> {
    root: PathBuf,
    config: &'a BiltConfig,
    options: BTreeMap<String, bool>,
    manifests: &'a BTreeMap<String, Manifest>,
}

impl<'a> PhaseRunner<'a> {
    /// Create a runner
    ///
    /// `options` are the resolved option values, `manifests` the parsed
    /// package manifests keyed by directory.
    pub fn new(
        root: &Path,
        config: &'a BiltConfig,
        options: BTreeMap<String, bool>,
        manifests: &'a BTreeMap<String, Manifest>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            options,
            manifests,
        }
    }

    /// Steps of a phase that apply to a directory
    pub fn steps_for(&self, phase: Phase, directory: &str) -> Vec<StepConfig> {
        self.config
            .steps(phase)
            .into_iter()
            .filter(|step| self.should_run(step, directory))
            .collect()
    }

    fn should_run(&self, step: &StepConfig, directory: &str) -> bool {
        if let Some(option) = &step.option {
            if !self.options.get(option).copied().unwrap_or(false) {
                return false;
            }
        }
        match &step.when {
            None => true,
            Some(StepCondition::Script(script)) => self
                .manifests
                .get(directory)
                .is_some_and(|manifest| manifest.has_script(script)),
            Some(StepCondition::File(file)) => self.root.join(directory).join(file).exists(),
        }
    }

    fn base_env(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(ENV_ROOT.to_string(), self.root.display().to_string())])
    }

    /// Substitute variables and attach the working directory
    fn prepare(
        &self,
        step: &StepConfig,
        cwd: PathBuf,
        mut env: BTreeMap<String, String>,
    ) -> Result<StepCommand, StepError> {
        let substitution = |error: String| StepError::Substitution {
            step: step.name.clone(),
            error,
        };

        for (key, value) in &step.env {
            let value = substitute_vars(value, &env).map_err(substitution)?;
            env.insert(key.clone(), value);
        }
        let argv = step
            .command
            .iter()
            .map(|arg| substitute_vars(arg, &env))
            .collect::<Result<Vec<_>, _>>()
            .map_err(substitution)?;

        Ok(StepCommand {
            name: step.name.clone(),
            argv,
            cwd,
            env,
        })
    }

    async fn run_steps(
        &self,
        phase: Phase,
        directory: &str,
        env: BTreeMap<String, String>,
    ) -> Result<(), StepError> {
        let cwd = if directory == ROOT_DIRECTORY {
            self.root.clone()
        } else {
            self.root.join(directory)
        };

        for step in self.steps_for(phase, directory) {
            let command = self.prepare(&step, cwd.clone(), env.clone())?;
            tracing::info!("[{phase}] {directory}: {}", step.name);
            let output = run_step(&command).await?;
            if !output.stdout.trim().is_empty() {
                tracing::debug!("{}:\n{}", step.name, output.stdout.trim_end());
            }
        }
        Ok(())
    }

    /// Run the before phase in the root
    pub async fn run_before(&self) -> Result<(), StepError> {
        self.run_steps(Phase::Before, ROOT_DIRECTORY, self.base_env()).await
    }

    /// Run the during phase for one package
    pub async fn run_package(&self, package_info: &PackageInfo) -> Result<(), StepError> {
        let mut env = self.base_env();
        env.insert(ENV_PACKAGE_NAME.to_string(), package_info.name.clone());
        env.insert(ENV_PACKAGE_DIR.to_string(), package_info.directory().to_string());
        self.run_steps(Phase::During, package_info.directory(), env).await
    }

    /// Run the after phase in the root, telling it how the packages went
    pub async fn run_after(&self, built: usize, failed: usize) -> Result<(), StepError> {
        let mut env = self.base_env();
        env.insert(ENV_BUILT_COUNT.to_string(), built.to_string());
        env.insert(ENV_FAILED_COUNT.to_string(), failed.to_string());
        self.run_steps(Phase::After, ROOT_DIRECTORY, env).await
    }
}

/// Builds packages by running the during phase, then records a marker
pub struct PhaseBuilder<'r, 'a> {
    runner: &'r PhaseRunner<'a>,
    recorder: Option<&'r MarkerRecorder<'r>>,
}

impl<'r, 'a> PhaseBuilder<'r, 'a> {
    /// Builder running `runner`'s during phase; markers are written only
    /// when a recorder is given
    pub fn new(runner: &'r PhaseRunner<'a>, recorder: Option<&'r MarkerRecorder<'r>>) -> Self {
        Self { runner, recorder }
    }
}

impl PackageBuilder for PhaseBuilder<'_, '_> {
    fn build_package<'b>(
        &'b mut self,
        package_info: &'b PackageInfo,
    ) -> BoxFuture<'b, anyhow::Result<BuildOutcome>> {
        Box::pin(async move {
            self.runner.run_package(package_info).await?;
            if let Some(recorder) = self.recorder {
                if let Err(e) = recorder.record(&package_info.package).await {
                    tracing::warn!("Could not record build of {}: {e}", package_info.package);
                }
            }
            Ok(BuildOutcome::Success)
        })
    }
}

/// Builder that runs nothing and remembers what it was asked to build
#[derive(Debug, Default)]
pub struct DryRunBuilder {
    /// Packages in the order they would have been built
    pub visited: Vec<Package>,
}

impl PackageBuilder for DryRunBuilder {
    fn build_package<'b>(
        &'b mut self,
        package_info: &'b PackageInfo,
    ) -> BoxFuture<'b, anyhow::Result<BuildOutcome>> {
        self.visited.push(package_info.package.clone());
        Box::pin(async { Ok(BuildOutcome::Success) })
    }
}
