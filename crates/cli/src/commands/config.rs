use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cquiz_core::config::{resolve_config_path, AppConfig};
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// One rendered setting: dotted key, effective value and the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    CommandResult::success(
        "config",
        render(&config, config_file_doc.as_ref(), config_file_path.as_deref()),
    )
}

pub fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(field.key, field.env_keys, config_file_doc, config_file_path);
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["CQUIZ_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["CQUIZ_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["CQUIZ_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "chat.bot_user_id",
            value: config.chat.bot_user_id.clone(),
            env_keys: &["CQUIZ_CHAT_BOT_USER_ID"],
        },
        Field {
            key: "chat.command_trigger",
            value: config.chat.command_trigger.clone(),
            env_keys: &["CQUIZ_CHAT_COMMAND_TRIGGER"],
        },
        Field {
            key: "scheduler.interval_secs",
            value: config.scheduler.interval_secs.to_string(),
            env_keys: &["CQUIZ_SCHEDULER_INTERVAL_SECS"],
        },
        Field {
            key: "reveal.answer_delay_secs",
            value: config.reveal.answer_delay_secs.to_string(),
            env_keys: &["CQUIZ_REVEAL_ANSWER_DELAY_SECS"],
        },
        Field {
            key: "reveal.pacing_delay_secs",
            value: config.reveal.pacing_delay_secs.to_string(),
            env_keys: &["CQUIZ_REVEAL_PACING_DELAY_SECS"],
        },
        Field {
            key: "store.document_key",
            value: config.store.document_key.clone(),
            env_keys: &["CQUIZ_STORE_DOCUMENT_KEY"],
        },
        Field {
            key: "store.max_conflict_retries",
            value: config.store.max_conflict_retries.to_string(),
            env_keys: &["CQUIZ_STORE_MAX_CONFLICT_RETRIES"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CQUIZ_LOGGING_LEVEL", "CQUIZ_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["CQUIZ_LOGGING_FORMAT", "CQUIZ_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use cquiz_core::config::AppConfig;
    use toml::Value;

    use super::{contains_path, render};

    #[test]
    fn nested_keys_are_found_in_file_documents() {
        let doc: Value = "[scheduler]\ninterval_secs = 9\n".parse().expect("toml");

        assert!(contains_path(&doc, "scheduler.interval_secs"));
        assert!(!contains_path(&doc, "scheduler.missing"));
        assert!(!contains_path(&doc, "reveal.answer_delay_secs"));
    }

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let doc: Value = "[reveal]\npacing_delay_secs = 4\n".parse().expect("toml");

        let rendered =
            render(&AppConfig::default(), Some(&doc), Some(Path::new("config/cquiz.toml")));

        assert!(rendered
            .lines()
            .any(|line| line.starts_with("- reveal.pacing_delay_secs = 2 (source: file (")));
        assert!(rendered.contains("- chat.command_trigger = cquiz (source: "));
        assert_eq!(rendered.lines().count(), 13);
    }
}
