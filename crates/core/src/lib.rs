pub mod config;
pub mod domain;
pub mod errors;
pub mod presentation;
pub mod session;
pub mod settings;
pub mod suggestions;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::cart::{Cart, CartFingerprint, CartLine, CartLineId, Complement};
pub use domain::catalog::Catalog;
pub use domain::product::{Product, ProductCategory, ProductId};
pub use errors::{ApplicationError, DomainError};
pub use presentation::{RotationState, RotationTask, Rotator};
pub use session::{CartSink, InMemoryCartSink, UpsellSession};
pub use settings::{
    ConfigStore, FileSettingsRepository, InMemorySettingsRepository, SettingsRepository,
    SettingsSubscription, TriggerToggles, UpsellSettings,
};
pub use suggestions::{
    MemoOutcome, RankedSuggestions, RuleRegistry, Suggestion, SuggestionEngine, TriggerCategory,
};
