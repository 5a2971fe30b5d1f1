use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use upsell_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

/// Loads the configuration itself so load failures are reported under `config`.
pub fn run(explicit_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        require_file: explicit_path.is_some(),
        config_path: explicit_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_config_error("config", &error),
    };
    CommandResult::text(render(&config, explicit_path))
}

/// Effective configuration with the layer each value came from.
pub fn render(config: &AppConfig, explicit_path: Option<&Path>) -> String {
    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let lines = [
        "effective config (source precedence: env > file > default):".to_string(),
        render_line(
            "logging.level",
            &config.logging.level,
            source("logging.level", &["UPSELL_LOGGING_LEVEL", "UPSELL_LOG_LEVEL"]),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", &["UPSELL_LOGGING_FORMAT", "UPSELL_LOG_FORMAT"]),
        ),
        render_line(
            "settings.path",
            &config.settings.path.display().to_string(),
            source("settings.path", &["UPSELL_SETTINGS_PATH"]),
        ),
        render_line(
            "rotation.period_secs",
            &config.rotation.period_secs.to_string(),
            source("rotation.period_secs", &["UPSELL_ROTATION_PERIOD_SECS"]),
        ),
    ];

    lines.join("\n")
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("upsell.toml"), PathBuf::from("config/upsell.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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
