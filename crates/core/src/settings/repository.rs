use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::errors::ApplicationError;

/// Persisted key-value settings collaborator.
pub trait SettingsRepository: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, ApplicationError>;
    fn write(&self, key: &str, value: &str) -> Result<(), ApplicationError>;
}

#[derive(Clone, Default)]
pub struct InMemorySettingsRepository {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemorySettingsRepository {
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let repository = Self::default();
        match repository.values.lock() {
            Ok(mut values) => values.insert(key.into(), value.into()),
            Err(poisoned) => poisoned.into_inner().insert(key.into(), value.into()),
        };
        repository
    }
}

impl SettingsRepository for InMemorySettingsRepository {
    fn read(&self, key: &str) -> Result<Option<String>, ApplicationError> {
        let value = match self.values.lock() {
            Ok(values) => values.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        };
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ApplicationError> {
        match self.values.lock() {
            Ok(mut values) => values.insert(key.to_owned(), value.to_owned()),
            Err(poisoned) => poisoned.into_inner().insert(key.to_owned(), value.to_owned()),
        };
        Ok(())
    }
}

/// Stores every key as a member of one JSON object on disk. Values that are
/// themselves JSON are kept structured so the file stays hand-editable.
#[derive(Clone, Debug)]
pub struct FileSettingsRepository {
    path: PathBuf,
}

impl FileSettingsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, ApplicationError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(error) => {
                return Err(ApplicationError::Persistence(format!(
                    "could not read settings file `{}`: {error}",
                    self.path.display()
                )))
            }
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(ApplicationError::Persistence(format!(
                "settings file `{}` must contain a JSON object",
                self.path.display()
            ))),
            Err(error) => Err(ApplicationError::Persistence(format!(
                "could not parse settings file `{}`: {error}",
                self.path.display()
            ))),
        }
    }
}

impl SettingsRepository for FileSettingsRepository {
    fn read(&self, key: &str) -> Result<Option<String>, ApplicationError> {
        let document = self.read_document()?;
        Ok(document.get(key).map(|value| match value {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ApplicationError> {
        let mut document = self.read_document()?;
        let stored =
            serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_owned()));
        document.insert(key.to_owned(), stored);

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| {
                ApplicationError::Persistence(format!(
                    "could not create settings directory `{}`: {error}",
                    parent.display()
                ))
            })?;
        }

        let rendered = serde_json::to_string_pretty(&Value::Object(document))
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        fs::write(&self.path, rendered).map_err(|error| {
            ApplicationError::Persistence(format!(
                "could not write settings file `{}`: {error}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{FileSettingsRepository, InMemorySettingsRepository, SettingsRepository};
    use crate::errors::ApplicationError;

    #[test]
    fn in_memory_round_trips_values() {
        let repository = InMemorySettingsRepository::default();
        assert_eq!(repository.read("missing"), Ok(None));

        repository.write("upsell_settings", r#"{"enabled":false}"#).expect("write");
        assert_eq!(
            repository.read("upsell_settings"),
            Ok(Some(r#"{"enabled":false}"#.to_owned()))
        );
    }

    #[test]
    fn file_repository_treats_missing_file_as_empty() {
        let dir = TempDir::new().expect("tempdir");
        let repository = FileSettingsRepository::new(dir.path().join("nested/settings.json"));

        assert_eq!(repository.read("upsell_settings"), Ok(None));
    }

    #[test]
    fn file_repository_keeps_json_values_structured() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("settings.json");
        let repository = FileSettingsRepository::new(&path);

        repository.write("upsell_settings", r#"{"maxSuggestions":3}"#).expect("write");
        repository.write("theme", "dark").expect("write");

        let raw = fs::read_to_string(&path).expect("settings file");
        let document: serde_json::Value = serde_json::from_str(&raw).expect("json document");
        assert_eq!(document["upsell_settings"]["maxSuggestions"], 3);
        assert_eq!(document["theme"], "dark");
        assert_eq!(repository.read("theme"), Ok(Some("dark".to_owned())));
    }

    #[test]
    fn corrupt_file_is_a_persistence_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write corrupt file");

        let error = FileSettingsRepository::new(&path).read("upsell_settings");
        assert!(matches!(error, Err(ApplicationError::Persistence(_))));
    }
}
