//! Repository configuration (.biltrc.toml)
//!
//! The configuration file marks the repository root. It lists or narrows the
//! packages, declares named options and the steps of the three build phases.
//! Step commands and env values may reference variables with `${VAR}`
//! syntax; they are substituted when the step runs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::defaults::{CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_HISTORY_DEPTH};
use crate::error::ConfigError;

/// Option switching the default test step
pub const TEST_OPTION: &str = "test";

/// Parsed `.biltrc.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiltConfig {
    /// Package directories, relative to the root; discovered when absent
    #[serde(default)]
    pub packages: Option<Vec<String>>,

    /// Extra directory names skipped by discovery
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Number of commits scanned for changes
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Declared options and their default values
    #[serde(default)]
    pub options: BTreeMap<String, bool>,

    /// Phase steps
    #[serde(default)]
    pub steps: StepsConfig,
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

impl Default for BiltConfig {
    fn default() -> Self {
        Self {
            packages: None,
            ignore: Vec::new(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            options: BTreeMap::new(),
            steps: StepsConfig::default(),
        }
    }
}

/// Steps of each build phase
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepsConfig {
    /// Run once in the root before any package
    #[serde(default)]
    pub before: Vec<StepConfig>,

    /// Run in every package directory; the npm defaults when absent
    #[serde(default)]
    pub during: Option<Vec<StepConfig>>,

    /// Run once in the root after all packages
    #[serde(default)]
    pub after: Vec<StepConfig>,
}

/// One command of a phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepConfig {
    /// Step name, used in output
    pub name: String,

    /// Program and arguments
    pub command: Vec<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Option that must resolve to true for the step to run
    #[serde(default)]
    pub option: Option<String>,

    /// Condition on the package the step runs in
    #[serde(default)]
    pub when: Option<StepCondition>,
}

impl StepConfig {
    /// Step running a command, with no option or condition
    pub fn new(name: &str, command: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.iter().map(ToString::to_string).collect(),
            env: BTreeMap::new(),
            option: None,
            when: None,
        }
    }
}

/// Condition under which a step runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepCondition {
    /// The package's manifest has this script
    Script(String),
    /// This file exists in the package directory
    File(String),
}

/// Build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Before any package
    Before,
    /// Per package
    During,
    /// After all packages
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::During => write!(f, "during"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Steps used for the during phase when none are configured
pub fn default_during_steps() -> Vec<StepConfig> {
    let mut build = StepConfig::new("build", &["npm", "run", "build"]);
    build.when = Some(StepCondition::Script("build".to_string()));

    let mut test = StepConfig::new("test", &["npm", "test"]);
    test.when = Some(StepCondition::Script("test".to_string()));
    test.option = Some(TEST_OPTION.to_string());

    vec![StepConfig::new("install", &["npm", "install"]), build, test]
}

impl BiltConfig {
    /// Parse and validate configuration text
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content, path)
    }

    /// Declared options; `test` is implicitly declared as enabled
    pub fn declared_options(&self) -> BTreeMap<String, bool> {
        let mut options = self.options.clone();
        options.entry(TEST_OPTION.to_string()).or_insert(true);
        options
    }

    /// Steps of a phase
    pub fn steps(&self, phase: Phase) -> Vec<StepConfig> {
        match phase {
            Phase::Before => self.steps.before.clone(),
            Phase::During => self
                .steps
                .during
                .clone()
                .unwrap_or_else(default_during_steps),
            Phase::After => self.steps.after.clone(),
        }
    }

    /// Option values after applying command line overrides
    pub fn resolve_options(
        &self,
        enable: &[String],
        disable: &[String],
    ) -> Result<BTreeMap<String, bool>, ConfigError> {
        let mut options = self.declared_options();
        for (names, value) in [(enable, true), (disable, false)] {
            for name in names {
                let slot = options
                    .get_mut(name)
                    .ok_or_else(|| ConfigError::UnknownOption {
                        option: name.clone(),
                    })?;
                *slot = value;
            }
        }
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let declared = self.declared_options();
        for phase in [Phase::Before, Phase::During, Phase::After] {
            for step in self.steps(phase) {
                if step.command.is_empty() {
                    return Err(ConfigError::EmptyCommand { step: step.name });
                }
                if let Some(option) = &step.option {
                    if !declared.contains_key(option) {
                        return Err(ConfigError::UndeclaredOption {
                            step: step.name,
                            option: option.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Locate the configuration file
///
/// The `BILT_CONFIG` environment variable wins; otherwise `.biltrc.toml` is
/// looked up in `start` and its ancestors.
pub fn find_config(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        let path = if path.is_absolute() { path } else { start.join(path) };
        if path.is_file() {
            return Ok(path);
        }
        return Err(ConfigError::ReadError {
            path,
            error: format!("set by {CONFIG_ENV_VAR} but not a file"),
        });
    }

    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound {
            start: start.to_path_buf(),
        })
}

/// Substitute `${VAR}` references
///
/// Variables are looked up in `vars` first, then in the process environment.
/// Unset variables become empty strings. A `${` that does not start a valid
/// reference is an error.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use bilt::core::config::substitute_vars;
///
/// let vars = BTreeMap::from([("NAME".to_string(), "core".to_string())]);
/// let result = substitute_vars("dist/${NAME}.js", &vars).unwrap();
/// assert_eq!(result, "dist/core.js");
/// ```
pub fn substitute_vars(input: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = VAR_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Variable reference regex should compile")
    });

    let mut last_end = 0;
    let mut output = String::new();

    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        push_literal(&mut output, &input[last_end..full_match.start()], input)?;

        let name = &cap[1];
        let value = vars
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
            .unwrap_or_default();
        output.push_str(&value);

        last_end = full_match.end();
    }

    push_literal(&mut output, &input[last_end..], input)?;
    Ok(output)
}

fn push_literal(output: &mut String, text: &str, input: &str) -> Result<(), String> {
    if text.contains("${") {
        return Err(format!("Malformed variable reference in '{input}'"));
    }
    output.push_str(text);
    Ok(())
}
