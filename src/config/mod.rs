
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static REPORT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub reports: ReportsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Slack app signing secret. When set, every inbound request must carry
    /// a valid `X-Slack-Signature`.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Legacy verification token, checked against the payload `token` field
    /// when no signing secret is configured.
    #[serde(default)]
    pub verification_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token used for file uploads
    #[serde(default)]
    pub bot_token: String,

    #[serde(default = "default_slack_api_base")]
    pub api_base: String,

    /// Channels the uploaded file is shared to (optional)
    #[serde(default)]
    pub upload_channels: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Directory generators write their files into
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// Wait after the generator returns, before checking for the file
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait after the file is found, before uploading it
    #[serde(default = "default_upload_delay_ms")]
    pub upload_delay_ms: u64,

    /// Registered reports, in the order they are offered to users
    #[serde(default = "default_definitions")]
    pub definitions: Vec<ReportDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub key: String,
    pub name: String,
    pub prefix: String,
    pub file_type: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_files_dir() -> String {
    "~/.report-dispatcher/files".to_string()
}
fn default_settle_delay_ms() -> u64 {
    250
}
fn default_upload_delay_ms() -> u64 {
    500
}
fn default_generator_timeout_secs() -> u64 {
    300
}
fn default_definitions() -> Vec<ReportDefinition> {
    vec![ReportDefinition {
        key: "userActivity".to_string(),
        name: "User Activity".to_string(),
        prefix: "userActivity".to_string(),
        file_type: "csv".to_string(),
        command: "user-activity-report".to_string(),
        args: Vec::new(),
        timeout_secs: default_generator_timeout_secs(),
    }]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            signing_secret: None,
            verification_token: None,
        }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_slack_api_base(),
            upload_channels: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            files_dir: default_files_dir(),
            settle_delay_ms: default_settle_delay_ms(),
            upload_delay_ms: default_upload_delay_ms(),
            definitions: default_definitions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ReportsConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }

    /// Files directory with `~` expanded, made absolute against the
    /// working directory so report commands and the poller agree on it.
    pub fn files_dir(&self) -> PathBuf {
        let dir = PathBuf::from(shellexpand::tilde(&self.files_dir).to_string());
        std::path::absolute(&dir).unwrap_or(dir)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default config is created from the commented template.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    Self::write_template(&default_path)?;
                }
                default_path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;

        config.expand_env_vars();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }

        if self.reports.files_dir.trim().is_empty() {
            anyhow::bail!("reports.files_dir cannot be empty");
        }

        if self.slack.request_timeout_secs == 0 {
            anyhow::bail!("slack.request_timeout_secs must be non-zero");
        }

        let mut seen = HashSet::new();
        for def in &self.reports.definitions {
            if !REPORT_KEY_RE.is_match(&def.key) {
                anyhow::bail!(
                    "Invalid report key '{}'. Expected letters, digits, '_' or '-'",
                    def.key
                );
            }
            if !seen.insert(def.key.as_str()) {
                anyhow::bail!("Duplicate report key '{}'", def.key);
            }
            if def.name.trim().is_empty() {
                anyhow::bail!("Report '{}' has an empty name", def.key);
            }
            if !REPORT_KEY_RE.is_match(&def.prefix) {
                anyhow::bail!("Report '{}' has an invalid prefix '{}'", def.key, def.prefix);
            }
            if def.file_type.trim().is_empty() {
                anyhow::bail!("Report '{}' has an empty file_type", def.key);
            }
            if def.command.trim().is_empty() {
                anyhow::bail!("Report '{}' has an empty command", def.key);
            }
            if def.timeout_secs == 0 {
                anyhow::bail!("Report '{}' needs a non-zero timeout_secs", def.key);
            }
        }

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

        Ok(base
            .home_dir()
            .join(".report-dispatcher")
            .join("config.toml"))
    }

    fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        eprintln!("Created default config at {}", path.display());
        Ok(())
    }

    fn expand_env_vars(&mut self) {
        self.slack.bot_token = expand_env(&self.slack.bot_token);
        if let Some(ref mut secret) = self.server.signing_secret {
            *secret = expand_env(secret);
        }
        if let Some(ref mut token) = self.server.verification_token {
            *token = expand_env(token);
        }
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| s.to_string())
    } else {
        s.to_string()
    }
}

/// Written on first run
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Report Dispatcher Configuration
# Auto-created on first run. Edit as needed.

[server]
bind = "127.0.0.1"
port = 3000
# Slack app signing secret (recommended)
# signing_secret = "${SLACK_SIGNING_SECRET}"
# Legacy verification token, used only when no signing secret is set
# verification_token = "${SLACK_VERIFICATION_TOKEN}"

[slack]
bot_token = "${SLACK_BOT_TOKEN}"
api_base = "https://slack.com/api"
# upload_channels = ["C0123456"]

[reports]
files_dir = "~/.report-dispatcher/files"
# Grace periods around the generator's file write
settle_delay_ms = 250
upload_delay_ms = 500

# Each report runs a command that writes $REPORT_FILE_PATH.
# Exiting successfully without writing the file means "no data".
[[reports.definitions]]
key = "userActivity"
name = "User Activity"
prefix = "userActivity"
file_type = "csv"
command = "user-activity-report"

[logging]
level = "info"
# format = "json"
"#;
