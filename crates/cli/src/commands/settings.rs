use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use upsell_core::config::AppConfig;
use upsell_core::errors::ApplicationError;
use upsell_core::settings::{
    ConfigStore, FileSettingsRepository, SettingsRepository, UpsellSettings, SETTINGS_KEY,
};
use upsell_core::suggestions::TriggerCategory;

use crate::commands::CommandResult;

#[derive(Clone, Debug, Default)]
pub struct SetArgs {
    /// Full replacement payload; individual flags are applied on top of it.
    pub payload: Option<String>,
    pub enabled: Option<bool>,
    pub max_suggestions: Option<usize>,
    pub enable_triggers: Vec<String>,
    pub disable_triggers: Vec<String>,
    pub low_value_threshold: Option<String>,
    pub confidence_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SettingsView<'a> {
    path: String,
    settings: &'a UpsellSettings,
}

pub fn show(config: &AppConfig) -> CommandResult {
    match load(config) {
        Ok(store) => {
            let settings = store.current();
            let view = SettingsView { path: config.settings.path.display().to_string(), settings: &settings };
            CommandResult::success_with("settings show", "current upsell settings", view)
        }
        Err(error) => CommandResult::from_error("settings show", &error),
    }
}

pub fn set(args: &SetArgs, config: &AppConfig) -> CommandResult {
    let result = load(config).and_then(|store| {
        let updated = apply(args, store.current())?;
        store.publish(updated)?;
        Ok(store.current())
    });

    match result {
        Ok(settings) => {
            let view = SettingsView { path: config.settings.path.display().to_string(), settings: &settings };
            CommandResult::success_with("settings set", "upsell settings persisted", view)
        }
        Err(error) => CommandResult::from_error("settings set", &error),
    }
}

/// Opens the file repository, surfacing unreadable files instead of falling
/// back to defaults the way the engine does.
fn load(config: &AppConfig) -> Result<ConfigStore, ApplicationError> {
    let repository = FileSettingsRepository::new(&config.settings.path);
    repository.read(SETTINGS_KEY)?;
    Ok(ConfigStore::load(Arc::new(repository)))
}

fn apply(args: &SetArgs, current: UpsellSettings) -> Result<UpsellSettings, ApplicationError> {
    let mut settings = match &args.payload {
        Some(raw) => UpsellSettings::from_json(raw)
            .map_err(|error| ApplicationError::Input(format!("invalid settings payload: {error}")))?,
        None => current,
    };

    if let Some(enabled) = args.enabled {
        settings.enabled = enabled;
    }
    if let Some(max_suggestions) = args.max_suggestions {
        settings.max_suggestions = max_suggestions;
    }
    for name in &args.enable_triggers {
        settings.triggers.set(parse_trigger(name)?, true);
    }
    for name in &args.disable_triggers {
        settings.triggers.set(parse_trigger(name)?, false);
    }
    if let Some(raw) = &args.low_value_threshold {
        settings.low_value_threshold = Decimal::from_str(raw.trim()).map_err(|error| {
            ApplicationError::Input(format!("invalid low value threshold `{raw}`: {error}"))
        })?;
    }
    if let Some(threshold) = args.confidence_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ApplicationError::Input(format!(
                "confidence threshold must be within 0..=1, got {threshold}"
            )));
        }
        settings.confidence_threshold = threshold;
    }

    Ok(settings)
}

fn parse_trigger(name: &str) -> Result<TriggerCategory, ApplicationError> {
    name.parse::<TriggerCategory>().map_err(ApplicationError::Input)
}
