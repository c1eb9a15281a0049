//! Layered configuration
//!
//! Sources are applied in order, later ones winning:
//! 1. built-in defaults
//! 2. TOML file (`workitems.toml` in the working directory, or `--config`)
//! 3. `AZURE_*` environment variables
//! 4. command-line flags ([`Overrides`])

use crate::error::{Error, Result};
use crate::submit::{EngineConfig, OrchestratorConfig, RetryPolicy};
use crate::types::Operation;
use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "workitems.toml";

/// CSV file used when nothing else is configured
pub const DEFAULT_CSV_FILE: &str = "tasks.csv";

/// Default Azure DevOps endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://dev.azure.com";

/// Retry and backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts per record; zero or negative means a single attempt
    pub max_attempts: i32,
    /// Delay before the second attempt
    pub initial_delay_ms: u64,
    /// Cap on any single delay
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// Scheme and host of the service
    pub base_url: String,
    /// `api-version` query parameter
    pub version: String,
    /// Work item type created by `submit`
    pub work_item_type: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            version: "7.1".to_string(),
            work_item_type: "Task".to_string(),
        }
    }
}

/// Fully resolved application settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// CSV file to read records from
    pub csv_file: PathBuf,
    /// Retry and backoff
    pub retry: RetrySettings,
    /// Per-request HTTP timeout
    pub http_timeout_ms: u64,
    /// Upper bound on in-flight remote calls
    pub max_concurrent_tasks: usize,
    /// Run full field validation before submitting
    pub validate_before_processing: bool,
    /// Keep going past invalid records and failed submissions
    pub continue_on_error: bool,
    /// Cancel the batch after this long
    pub batch_timeout_ms: Option<u64>,
    /// Remote API
    pub api: ApiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            csv_file: PathBuf::from(DEFAULT_CSV_FILE),
            retry: RetrySettings::default(),
            http_timeout_ms: 30_000,
            max_concurrent_tasks: 5,
            validate_before_processing: true,
            continue_on_error: false,
            batch_timeout_ms: None,
            api: ApiSettings::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--csv`
    pub csv_file: Option<PathBuf>,
    /// `--max-retry-attempts`
    pub max_retry_attempts: Option<i32>,
    /// `--initial-retry-delay`
    pub initial_retry_delay_ms: Option<u64>,
    /// `--max-retry-delay`
    pub max_retry_delay_ms: Option<u64>,
    /// `--http-timeout`
    pub http_timeout_ms: Option<u64>,
    /// `--max-concurrent-tasks`
    pub max_concurrent_tasks: Option<usize>,
    /// `--skip-validation`
    pub skip_validation: bool,
    /// `--continue-on-error`
    pub continue_on_error: bool,
    /// `--batch-timeout`
    pub batch_timeout_ms: Option<u64>,
    /// `--api-base-url`
    pub api_base_url: Option<String>,
    /// `--work-item-type`
    pub work_item_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    csv: CsvSection,
    app: AppSection,
    api: ApiSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CsvSection {
    file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AppSection {
    max_retry_attempts: Option<i32>,
    initial_retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    http_timeout_ms: Option<u64>,
    max_concurrent_tasks: Option<usize>,
    validate_before_processing: Option<bool>,
    continue_on_error: Option<bool>,
    batch_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ApiSection {
    base_url: Option<String>,
    version: Option<String>,
    work_item_type: Option<String>,
}

impl Settings {
    /// Resolve settings from every layer
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut settings = Self::default();

        match config_path {
            Some(path) => settings.apply_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    settings.apply_file(path)?;
                }
            }
        }

        settings.apply_env(|key| env::var(key).ok())?;
        settings.apply_overrides(overrides);
        settings.validate()?;

        debug!(?settings, "Configuration resolved");
        Ok(settings)
    }

    /// Apply a TOML config file
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        self.apply_toml(&text)?;
        debug!(path = %path.display(), "Configuration loaded from file");
        Ok(())
    }

    /// Apply TOML config text
    pub fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;

        if let Some(v) = file.csv.file {
            self.csv_file = v;
        }

        let app = file.app;
        if let Some(v) = app.max_retry_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = app.initial_retry_delay_ms {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = app.max_retry_delay_ms {
            self.retry.max_delay_ms = v;
        }
        if let Some(v) = app.http_timeout_ms {
            self.http_timeout_ms = v;
        }
        if let Some(v) = app.max_concurrent_tasks {
            self.max_concurrent_tasks = v;
        }
        if let Some(v) = app.validate_before_processing {
            self.validate_before_processing = v;
        }
        if let Some(v) = app.continue_on_error {
            self.continue_on_error = v;
        }
        if app.batch_timeout_ms.is_some() {
            self.batch_timeout_ms = app.batch_timeout_ms;
        }

        let api = file.api;
        if let Some(v) = api.base_url {
            self.api.base_url = v;
        }
        if let Some(v) = api.version {
            self.api.version = v;
        }
        if let Some(v) = api.work_item_type {
            self.api.work_item_type = v;
        }

        Ok(())
    }

    /// Apply environment variables read through `lookup`
    ///
    /// Empty values are ignored; unparseable ones are an error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("AZURE_TASK_CSV_FILE") {
            self.csv_file = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&var, "AZURE_MAX_RETRY_ATTEMPTS")? {
            self.retry.max_attempts = v;
        }
        if let Some(v) = parse_env(&var, "AZURE_INITIAL_RETRY_DELAY_MS")? {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = parse_env(&var, "AZURE_MAX_RETRY_DELAY_MS")? {
            self.retry.max_delay_ms = v;
        }
        if let Some(v) = parse_env(&var, "AZURE_HTTP_TIMEOUT_MS")? {
            self.http_timeout_ms = v;
        }
        if let Some(v) = parse_env(&var, "AZURE_MAX_CONCURRENT_TASKS")? {
            self.max_concurrent_tasks = v;
        }
        if let Some(v) = var("AZURE_VALIDATE_BEFORE_PROCESSING") {
            self.validate_before_processing = parse_bool("AZURE_VALIDATE_BEFORE_PROCESSING", &v)?;
        }
        if let Some(v) = var("AZURE_CONTINUE_ON_ERROR") {
            self.continue_on_error = parse_bool("AZURE_CONTINUE_ON_ERROR", &v)?;
        }
        if let Some(v) = parse_env(&var, "AZURE_BATCH_TIMEOUT_MS")? {
            self.batch_timeout_ms = Some(v);
        }
        if let Some(v) = var("AZURE_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = var("AZURE_API_VERSION") {
            self.api.version = v;
        }
        if let Some(v) = var("AZURE_WORK_ITEM_TYPE") {
            self.api.work_item_type = v;
        }

        Ok(())
    }

    /// Apply command-line flags
    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(v) = &o.csv_file {
            self.csv_file.clone_from(v);
        }
        if let Some(v) = o.max_retry_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = o.initial_retry_delay_ms {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = o.max_retry_delay_ms {
            self.retry.max_delay_ms = v;
        }
        if let Some(v) = o.http_timeout_ms {
            self.http_timeout_ms = v;
        }
        if let Some(v) = o.max_concurrent_tasks {
            self.max_concurrent_tasks = v;
        }
        if o.skip_validation {
            self.validate_before_processing = false;
        }
        if o.continue_on_error {
            self.continue_on_error = true;
        }
        if o.batch_timeout_ms.is_some() {
            self.batch_timeout_ms = o.batch_timeout_ms;
        }
        if let Some(v) = &o.api_base_url {
            self.api.base_url.clone_from(v);
        }
        if let Some(v) = &o.work_item_type {
            self.api.work_item_type.clone_from(v);
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(Error::Config(
                "max concurrent tasks must be at least 1".to_string(),
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "initial retry delay ({} ms) exceeds max retry delay ({} ms)",
                self.retry.initial_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.http_timeout_ms == 0 {
            return Err(Error::Config("HTTP timeout must be positive".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("API base URL is empty".to_string()));
        }
        Ok(())
    }

    /// Per-request HTTP timeout
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Engine settings for one batch
    pub fn engine_config(&self, operation: Operation) -> EngineConfig {
        EngineConfig {
            operation,
            max_concurrent_tasks: self.max_concurrent_tasks,
            retry: RetryPolicy::from_settings(&self.retry),
            batch_timeout: self.batch_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Orchestrator settings for one batch
    pub fn orchestrator_config(&self, operation: Operation) -> OrchestratorConfig {
        OrchestratorConfig {
            validate_before_processing: self.validate_before_processing,
            continue_on_error: self.continue_on_error,
            engine: self.engine_config(operation),
        }
    }
}

fn parse_env<F, T>(var: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid value for {key}: {raw:?} ({e})")))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "invalid value for {key}: {raw:?} (expected true or false)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.csv_file, PathBuf::from("tasks.csv"));
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.retry.initial_delay_ms, 1000);
        assert_eq!(s.retry.max_delay_ms, 10_000);
        assert_eq!(s.http_timeout_ms, 30_000);
        assert_eq!(s.max_concurrent_tasks, 5);
        assert!(s.validate_before_processing);
        assert!(!s.continue_on_error);
        assert!(s.batch_timeout_ms.is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_toml_layer() {
        let mut s = Settings::default();
        s.apply_toml(
            r#"
            [csv]
            file = "sprint-12.csv"

            [app]
            max_retry_attempts = 5
            max_concurrent_tasks = 10
            continue_on_error = true

            [api]
            work_item_type = "Bug"
            "#,
        )
        .unwrap();

        assert_eq!(s.csv_file, PathBuf::from("sprint-12.csv"));
        assert_eq!(s.retry.max_attempts, 5);
        assert_eq!(s.max_concurrent_tasks, 10);
        assert!(s.continue_on_error);
        assert_eq!(s.api.work_item_type, "Bug");
        // untouched keys keep their defaults
        assert_eq!(s.retry.initial_delay_ms, 1000);
        assert_eq!(s.api.version, "7.1");
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let mut s = Settings::default();
        let err = s.apply_toml("[app]\nmax_retries = 3\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut s = Settings::default();
        s.apply_toml("[app]\nmax_retry_attempts = 5\nhttp_timeout_ms = 1000\n")
            .unwrap();

        let env = env_from(&[
            ("AZURE_MAX_RETRY_ATTEMPTS", "7"),
            ("AZURE_CONTINUE_ON_ERROR", "TRUE"),
            ("AZURE_TASK_CSV_FILE", ""),
        ]);
        s.apply_env(|k| env.get(k).cloned()).unwrap();

        assert_eq!(s.retry.max_attempts, 7);
        assert_eq!(s.http_timeout_ms, 1000);
        assert!(s.continue_on_error);
        // empty values are ignored
        assert_eq!(s.csv_file, PathBuf::from("tasks.csv"));
    }

    #[test]
    fn test_env_invalid_number_is_error() {
        let mut s = Settings::default();
        let env = env_from(&[("AZURE_MAX_CONCURRENT_TASKS", "lots")]);
        let err = s.apply_env(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("AZURE_MAX_CONCURRENT_TASKS"));
    }

    #[test]
    fn test_env_invalid_bool_is_error() {
        let mut s = Settings::default();
        let env = env_from(&[("AZURE_VALIDATE_BEFORE_PROCESSING", "maybe")]);
        assert!(s.apply_env(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut s = Settings::default();
        let env = env_from(&[
            ("AZURE_MAX_RETRY_ATTEMPTS", "7"),
            ("AZURE_CSV_FILE_IGNORED", "x.csv"),
        ]);
        s.apply_env(|k| env.get(k).cloned()).unwrap();
        s.apply_overrides(&Overrides {
            max_retry_attempts: Some(1),
            csv_file: Some(PathBuf::from("cli.csv")),
            skip_validation: true,
            ..Overrides::default()
        });

        assert_eq!(s.retry.max_attempts, 1);
        assert_eq!(s.csv_file, PathBuf::from("cli.csv"));
        assert!(!s.validate_before_processing);
        // flag absent: lower layer stays
        assert!(!s.continue_on_error);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let s = Settings {
            max_concurrent_tasks: 0,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let s = Settings {
            retry: RetrySettings {
                max_attempts: 3,
                initial_delay_ms: 5000,
                max_delay_ms: 1000,
            },
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[app]\nmax_concurrent_tasks = 2\n").unwrap();

        let s = Settings::load(
            Some(&path),
            &Overrides {
                max_concurrent_tasks: Some(3),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(s.max_concurrent_tasks, 3);
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/wib.toml")), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_engine_config_mapping() {
        let s = Settings {
            batch_timeout_ms: Some(2500),
            ..Settings::default()
        };
        let cfg = s.engine_config(Operation::Delete);
        assert_eq!(cfg.operation, Operation::Delete);
        assert_eq!(cfg.max_concurrent_tasks, 5);
        assert_eq!(cfg.batch_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(cfg.retry.max_attempts(), 3);
    }
}
