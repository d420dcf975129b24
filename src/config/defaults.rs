//! Default configuration values

/// Configuration file name, looked up from the working directory upwards
pub const CONFIG_FILE_NAME: &str = ".biltrc.toml";

/// Environment variable overriding the configuration file path
pub const CONFIG_ENV_VAR: &str = "BILT_CONFIG";

/// Package manifest file name
pub const MANIFEST_FILE_NAME: &str = "package.json";

/// Directory under the root holding bilt state
pub const STATE_DIR: &str = ".bilt";

/// Directory under [`STATE_DIR`] holding last-build markers
pub const MARKER_DIR: &str = "last-build";

/// Commits scanned by the change detector
pub const DEFAULT_HISTORY_DEPTH: usize = 1000;

/// Directory names discovery never descends into
pub const IGNORED_DIRS: &[&str] = &["node_modules"];

/// Hash recorded for an uncommitted file that was deleted
pub const DELETED_FILE_HASH: &str = "deleted";

/// Step environment variable: package name
pub const ENV_PACKAGE_NAME: &str = "BILT_PACKAGE_NAME";

/// Step environment variable: package directory, relative to the root
pub const ENV_PACKAGE_DIR: &str = "BILT_PACKAGE_DIR";

/// Step environment variable: absolute root path
pub const ENV_ROOT: &str = "BILT_ROOT";

/// Step environment variable for after steps: number of packages built
pub const ENV_BUILT_COUNT: &str = "BILT_BUILT_COUNT";

/// Step environment variable for after steps: number of failed packages
pub const ENV_FAILED_COUNT: &str = "BILT_FAILED_COUNT";
