//! App handler configuration: the TOML-deserialized shape and its
//! `Init`-time validation.

use crate::error::AppError;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

fn default_env() -> String {
    "production".to_string()
}

fn default_container() -> String {
    "root".to_string()
}

fn default_state() -> String {
    "state".to_string()
}

fn default_timeout_ms() -> u64 {
    200
}

fn default_cache_ttl_s() -> i64 {
    60
}

fn default_cache_max_items() -> usize {
    100
}

/// One state entry within a [`Rule`]. `key`/`resource` are templates
/// supporting `$<name>` substitution (numeric capture index, named
/// capture, or the literal `url`).
#[derive(Debug, Clone, Deserialize)]
pub struct StateEntry {
    /// Template for the key this entry is stored under in server state.
    pub key: String,
    /// Template for the resource key resolved through the [`crate::store::ResourceStore`].
    pub resource: String,
    /// Whether this entry is also copied into client state.
    #[serde(default)]
    pub export: bool,
}

/// A path rule: on match, resolves an ordered sequence of state entries
/// against a materialised parameter map.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Regex pattern matched against the request path.
    pub path: String,
    /// State entries to resolve on a match, in order.
    #[serde(default)]
    pub state: Vec<StateEntry>,
    /// Stops rule evaluation after this rule matches.
    #[serde(default)]
    pub last: bool,
}

/// A [`RuleConfig`] with its path regex pre-compiled at `Init`.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Precompiled form of [`RuleConfig::path`].
    pub path: Regex,
    /// State entries to resolve on a match, in order.
    pub state: Vec<StateEntry>,
    /// Stops rule evaluation after this rule matches.
    pub last: bool,
}

/// Raw, TOML-deserialized app handler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppHandlerConfig {
    /// Path to the index HTML template.
    pub index: String,
    /// Path to the JS app bundle.
    pub bundle: String,
    /// Environment name exposed to the bundle as `process.env.ENV`.
    #[serde(default = "default_env")]
    pub env: String,
    /// Id of the DOM element the rendered HTML is appended into.
    #[serde(default = "default_container")]
    pub container: String,
    /// Id of the `<script type="application/json">` tag holding client state.
    #[serde(default = "default_state")]
    pub state: String,
    /// Cooperative execution timeout, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum number of concurrently checked-out VMs. `0` resolves to
    /// the number of logical CPUs at `Init`.
    #[serde(default)]
    pub max_vms: usize,
    /// Whether rendered responses are cached by request path.
    #[serde(default)]
    pub cache_enabled: bool,
    /// Response cache ttl ceiling, in seconds.
    #[serde(default = "default_cache_ttl_s")]
    pub cache_ttl_s: i64,
    /// Response cache capacity.
    #[serde(default = "default_cache_max_items")]
    pub cache_max_items: usize,
    /// Path rules, evaluated in order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Validated configuration: rule regexes compiled, `max_vms` resolved
/// to a concrete count, index/bundle confirmed openable and not a
/// directory. Everything downstream (`AppHandler::init`) takes this,
/// never the raw TOML shape.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Path to the index HTML template.
    pub index: String,
    /// Path to the JS app bundle.
    pub bundle: String,
    /// Environment name exposed to the bundle as `process.env.ENV`.
    pub env: String,
    /// Id of the DOM element the rendered HTML is appended into.
    pub container: String,
    /// Id of the `<script type="application/json">` tag holding client state.
    pub state: String,
    /// Cooperative execution timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of concurrently checked-out VMs, already resolved
    /// from a `0` request to a concrete logical-CPU count.
    pub max_vms: usize,
    /// Whether rendered responses are cached by request path.
    pub cache_enabled: bool,
    /// Response cache ttl ceiling, in seconds.
    pub cache_ttl_s: i64,
    /// Response cache capacity.
    pub cache_max_items: usize,
    /// Path rules, evaluated in order, with paths precompiled.
    pub rules: Vec<Rule>,
}

fn check_openable(path: &str, label: &str) -> Result<(), AppError> {
    let meta = std::fs::metadata(path)
        .map_err(|e| AppError::Config(format!("{label} {path:?} not openable: {e}")))?;
    if meta.is_dir() {
        return Err(AppError::Config(format!("{label} {path:?} is a directory")));
    }
    Ok(())
}

fn resolve_max_vms(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl AppHandlerConfig {
    /// Loads and deserializes a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("failed to read config: {e}")))?;
        toml::from_str(&text).map_err(|e| AppError::Config(format!("invalid config: {e}")))
    }

    /// Performs every `Init`-time check: required fields present,
    /// index/bundle openable and not directories, every rule's path
    /// regex compiles. Resolves `max_vms` to a concrete count.
    pub fn validate(self) -> Result<ValidatedConfig, AppError> {
        if self.index.trim().is_empty() {
            return Err(AppError::Config("index is required".into()));
        }
        if self.bundle.trim().is_empty() {
            return Err(AppError::Config("bundle is required".into()));
        }
        check_openable(&self.index, "index")?;
        check_openable(&self.bundle, "bundle")?;

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            let path = Regex::new(&rule.path)
                .map_err(|e| AppError::Config(format!("invalid rule path {:?}: {e}", rule.path)))?;
            rules.push(Rule {
                path,
                state: rule.state,
                last: rule.last,
            });
        }

        Ok(ValidatedConfig {
            index: self.index,
            bundle: self.bundle,
            env: self.env,
            container: self.container,
            state: self.state,
            timeout_ms: self.timeout_ms,
            max_vms: resolve_max_vms(self.max_vms),
            cache_enabled: self.cache_enabled,
            cache_ttl_s: self.cache_ttl_s,
            cache_max_items: self.cache_max_items,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &[u8]) -> tempfile_path::TempFile {
        tempfile_path::TempFile::new(contents)
    }

    mod tempfile_path {
        use std::io::Write;
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicUsize, Ordering};

        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        /// Minimal scratch-file helper so config tests don't need a
        /// `tempfile` dependency just for two cases.
        pub struct TempFile {
            pub path: PathBuf,
        }

        impl TempFile {
            pub fn new(contents: &[u8]) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let mut path = std::env::temp_dir();
                path.push(format!("webvm-config-test-{}-{n}", std::process::id()));
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(contents).unwrap();
                Self { path }
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn missing_index_fails_validation() {
        let config = AppHandlerConfig {
            index: String::new(),
            bundle: "x".into(),
            env: default_env(),
            container: default_container(),
            state: default_state(),
            timeout_ms: default_timeout_ms(),
            max_vms: 0,
            cache_enabled: false,
            cache_ttl_s: default_cache_ttl_s(),
            cache_max_items: default_cache_max_items(),
            rules: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_vms_zero_resolves_to_logical_cpus() {
        let index = write_temp(b"<html></html>");
        let bundle = write_temp(b"// bundle");
        let config = AppHandlerConfig {
            index: index.path.to_string_lossy().into_owned(),
            bundle: bundle.path.to_string_lossy().into_owned(),
            env: default_env(),
            container: default_container(),
            state: default_state(),
            timeout_ms: default_timeout_ms(),
            max_vms: 0,
            cache_enabled: false,
            cache_ttl_s: default_cache_ttl_s(),
            cache_max_items: default_cache_max_items(),
            rules: vec![],
        };
        let validated = config.validate().unwrap();
        assert!(validated.max_vms >= 1);
    }

    #[test]
    fn invalid_rule_regex_fails_validation() {
        let index = write_temp(b"<html></html>");
        let bundle = write_temp(b"// bundle");
        let config = AppHandlerConfig {
            index: index.path.to_string_lossy().into_owned(),
            bundle: bundle.path.to_string_lossy().into_owned(),
            env: default_env(),
            container: default_container(),
            state: default_state(),
            timeout_ms: default_timeout_ms(),
            max_vms: 1,
            cache_enabled: false,
            cache_ttl_s: default_cache_ttl_s(),
            cache_max_items: default_cache_max_items(),
            rules: vec![RuleConfig {
                path: "(".into(),
                state: vec![],
                last: false,
            }],
        };
        assert!(config.validate().is_err());
    }
}
