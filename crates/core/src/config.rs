use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PREFIX: &str = "CQUIZ_";
pub const DEFAULT_CONFIG_FILE: &str = "cquiz.toml";
pub const FALLBACK_CONFIG_FILE: &str = "config/cquiz.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    pub scheduler: SchedulerConfig,
    pub reveal: RevealConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Messages authored by this user id are ignored by the router.
    pub bot_user_id: String,
    /// Slash command name without the leading `/`.
    pub command_trigger: String,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RevealConfig {
    pub answer_delay_secs: u64,
    pub pacing_delay_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub document_key: String,
    /// Extra load/apply/save rounds after a conflict. Zero keeps the ask-to-resend behavior.
    pub max_conflict_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_user_id: Option<String>,
    pub scheduler_interval_secs: Option<u64>,
    pub max_conflict_retries: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cquiz.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chat: ChatConfig {
                bot_user_id: "cquiz-bot".to_string(),
                command_trigger: "cquiz".to_string(),
            },
            scheduler: SchedulerConfig { interval_secs: 5 },
            reveal: RevealConfig { answer_delay_secs: 10, pacing_delay_secs: 2 },
            store: StoreConfig { document_key: "quizzes".to_string(), max_conflict_retries: 0 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl RevealConfig {
    pub fn answer_delay(&self) -> Duration {
        Duration::from_secs(self.answer_delay_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_secs(self.pacing_delay_secs)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(bot_user_id) = chat.bot_user_id {
                self.chat.bot_user_id = bot_user_id;
            }
            if let Some(command_trigger) = chat.command_trigger {
                self.chat.command_trigger = command_trigger;
            }
        }

        if let Some(interval_secs) = patch.scheduler.and_then(|scheduler| scheduler.interval_secs) {
            self.scheduler.interval_secs = interval_secs;
        }

        if let Some(reveal) = patch.reveal {
            if let Some(answer_delay_secs) = reveal.answer_delay_secs {
                self.reveal.answer_delay_secs = answer_delay_secs;
            }
            if let Some(pacing_delay_secs) = reveal.pacing_delay_secs {
                self.reveal.pacing_delay_secs = pacing_delay_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(document_key) = store.document_key {
                self.store.document_key = document_key;
            }
            if let Some(max_conflict_retries) = store.max_conflict_retries {
                self.store.max_conflict_retries = max_conflict_retries;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CQUIZ_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CQUIZ_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CQUIZ_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CQUIZ_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CQUIZ_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CQUIZ_CHAT_BOT_USER_ID") {
            self.chat.bot_user_id = value;
        }
        if let Some(value) = read_env("CQUIZ_CHAT_COMMAND_TRIGGER") {
            self.chat.command_trigger = value;
        }

        if let Some(value) = read_env("CQUIZ_SCHEDULER_INTERVAL_SECS") {
            self.scheduler.interval_secs = parse_u64("CQUIZ_SCHEDULER_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("CQUIZ_REVEAL_ANSWER_DELAY_SECS") {
            self.reveal.answer_delay_secs = parse_u64("CQUIZ_REVEAL_ANSWER_DELAY_SECS", &value)?;
        }
        if let Some(value) = read_env("CQUIZ_REVEAL_PACING_DELAY_SECS") {
            self.reveal.pacing_delay_secs = parse_u64("CQUIZ_REVEAL_PACING_DELAY_SECS", &value)?;
        }

        if let Some(value) = read_env("CQUIZ_STORE_DOCUMENT_KEY") {
            self.store.document_key = value;
        }
        if let Some(value) = read_env("CQUIZ_STORE_MAX_CONFLICT_RETRIES") {
            self.store.max_conflict_retries =
                parse_u32("CQUIZ_STORE_MAX_CONFLICT_RETRIES", &value)?;
        }

        let log_level = read_env("CQUIZ_LOGGING_LEVEL").or_else(|| read_env("CQUIZ_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("CQUIZ_LOGGING_FORMAT").or_else(|| read_env("CQUIZ_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_user_id) = overrides.bot_user_id {
            self.chat.bot_user_id = bot_user_id;
        }
        if let Some(interval_secs) = overrides.scheduler_interval_secs {
            self.scheduler.interval_secs = interval_secs;
        }
        if let Some(max_conflict_retries) = overrides.max_conflict_retries {
            self.store.max_conflict_retries = max_conflict_retries;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_chat(&self.chat)?;
        validate_scheduler(&self.scheduler)?;
        validate_reveal(&self.reveal)?;
        validate_store(&self.store)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// First config file that exists, honoring an explicit path when given.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(FALLBACK_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.bot_user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_user_id is required so the bot can ignore its own messages".to_string(),
        ));
    }

    let trigger = chat.command_trigger.trim();
    if trigger.is_empty() || trigger.starts_with('/') || trigger.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(
            "chat.command_trigger must be a single word without the leading `/`".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
    if scheduler.interval_secs == 0 || scheduler.interval_secs > 3_600 {
        return Err(ConfigError::Validation(
            "scheduler.interval_secs must be in range 1..=3600".to_string(),
        ));
    }
    Ok(())
}

fn validate_reveal(reveal: &RevealConfig) -> Result<(), ConfigError> {
    if reveal.answer_delay_secs > 600 || reveal.pacing_delay_secs > 600 {
        return Err(ConfigError::Validation(
            "reveal delays must be at most 600 seconds".to_string(),
        ));
    }
    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if store.document_key.trim().is_empty() {
        return Err(ConfigError::Validation("store.document_key must not be empty".to_string()));
    }
    if store.max_conflict_retries > 10 {
        return Err(ConfigError::Validation(
            "store.max_conflict_retries must be in range 0..=10".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    chat: Option<ChatPatch>,
    scheduler: Option<SchedulerPatch>,
    reveal: Option<RevealPatch>,
    store: Option<StorePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    bot_user_id: Option<String>,
    command_trigger: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerPatch {
    interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RevealPatch {
    answer_delay_secs: Option<u64>,
    pacing_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    document_key: Option<String>,
    max_conflict_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_original_timings() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.scheduler.interval() == Duration::from_secs(5), "tick every 5 seconds")?;
        ensure(config.reveal.answer_delay() == Duration::from_secs(10), "answer after 10s")?;
        ensure(config.reveal.pacing_delay() == Duration::from_secs(2), "pace 2s")?;
        ensure(config.store.document_key == "quizzes", "document stored under `quizzes`")?;
        ensure(config.store.max_conflict_retries == 0, "conflicts are not retried by default")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CQUIZ_BOT_ID", "U-bot-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cquiz.toml");
            fs::write(
                &path,
                r#"
[chat]
bot_user_id = "${TEST_CQUIZ_BOT_ID}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.chat.bot_user_id == "U-bot-from-env",
                "bot user id should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_CQUIZ_BOT_ID"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_CQUIZ_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("cquiz.toml");
        fs::write(&path, "[store]\ndocument_key = \"${TEST_CQUIZ_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let result =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                result,
                Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_CQUIZ_UNSET"
            ),
            "missing variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CQUIZ_LOG_LEVEL", "warn");
        env::set_var("CQUIZ_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )
        })();

        clear_vars(&["CQUIZ_LOG_LEVEL", "CQUIZ_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CQUIZ_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CQUIZ_SCHEDULER_INTERVAL_SECS", "9");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("cquiz.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[scheduler]
interval_secs = 30

[store]
max_conflict_retries = 2

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.scheduler.interval_secs == 9, "env interval should win over file")?;
            ensure(config.store.max_conflict_retries == 2, "file value should win over default")
        })();

        clear_vars(&["CQUIZ_DATABASE_URL", "CQUIZ_SCHEDULER_INTERVAL_SECS"]);
        result
    }

    #[test]
    fn invalid_env_number_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CQUIZ_REVEAL_ANSWER_DELAY_SECS", "soon");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "CQUIZ_REVEAL_ANSWER_DELAY_SECS"
                ),
                "invalid override should name the variable",
            )
        })();

        clear_vars(&["CQUIZ_REVEAL_ANSWER_DELAY_SECS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CQUIZ_CHAT_COMMAND_TRIGGER", "/cquiz");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("chat.command_trigger")
            );
            ensure(has_message, "validation failure should mention chat.command_trigger")
        })();

        clear_vars(&["CQUIZ_CHAT_COMMAND_TRIGGER"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref missing)) if *missing == path),
            "missing required file should be reported",
        )
    }
}
