use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use upsell_core::config::AppConfig;
use upsell_core::domain::cart::Cart;
use upsell_core::domain::catalog::Catalog;
use upsell_core::errors::ApplicationError;
use upsell_core::settings::{ConfigStore, FileSettingsRepository};

/// Reads a cart snapshot, recomputes line totals and rejects malformed lines.
pub fn load_cart(path: &Path) -> Result<Cart, ApplicationError> {
    let mut cart: Cart = read_json(path, "cart")?;
    cart.normalize_totals();
    cart.validate()?;
    Ok(cart)
}

pub fn load_catalog(path: &Path) -> Result<Catalog, ApplicationError> {
    read_json(path, "catalog")
}

/// Settings store backed by the JSON file named in `[settings] path`.
pub fn open_store(config: &AppConfig) -> ConfigStore {
    ConfigStore::load(Arc::new(FileSettingsRepository::new(&config.settings.path)))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, ApplicationError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        ApplicationError::Input(format!("could not read {what} file `{}`: {error}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        ApplicationError::Input(format!("could not parse {what} file `{}`: {error}", path.display()))
    })
}
