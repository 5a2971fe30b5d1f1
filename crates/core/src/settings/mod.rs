//! Engine settings and the store that owns them
//!
//! Settings are read once from the persisted key-value repository and then
//! replaced wholesale whenever a new payload is published. Every subscriber
//! receives the full settings object, never a delta.

mod repository;

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{info, warn};

pub use repository::{FileSettingsRepository, InMemorySettingsRepository, SettingsRepository};

use crate::errors::ApplicationError;
use crate::suggestions::{TriggerCategory, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_SUGGESTIONS};

/// Repository key holding the serialized settings.
pub const SETTINGS_KEY: &str = "upsell_settings";

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerToggles {
    pub social_proof: bool,
    pub urgency: bool,
    pub affinity: bool,
    pub value: bool,
}

impl Default for TriggerToggles {
    fn default() -> Self {
        Self { social_proof: true, urgency: true, affinity: true, value: true }
    }
}

impl TriggerToggles {
    pub fn is_enabled(&self, trigger: TriggerCategory) -> bool {
        match trigger {
            TriggerCategory::SocialProof => self.social_proof,
            TriggerCategory::Urgency => self.urgency,
            TriggerCategory::Affinity => self.affinity,
            TriggerCategory::Value => self.value,
        }
    }

    pub fn set(&mut self, trigger: TriggerCategory, enabled: bool) {
        match trigger {
            TriggerCategory::SocialProof => self.social_proof = enabled,
            TriggerCategory::Urgency => self.urgency = enabled,
            TriggerCategory::Affinity => self.affinity = enabled,
            TriggerCategory::Value => self.value = enabled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsellSettings {
    pub enabled: bool,
    pub max_suggestions: usize,
    pub triggers: TriggerToggles,
    pub low_value_threshold: Decimal,
    pub confidence_threshold: f64,
}

impl Default for UpsellSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            triggers: TriggerToggles::default(),
            low_value_threshold: Decimal::new(2500, 2),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl UpsellSettings {
    /// Clamps values into their meaningful ranges.
    pub fn sanitized(mut self) -> Self {
        if !self.confidence_threshold.is_finite() {
            self.confidence_threshold = DEFAULT_CONFIDENCE_THRESHOLD;
        }
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        if self.low_value_threshold < Decimal::ZERO {
            self.low_value_threshold = Decimal::ZERO;
        }
        self
    }

    /// Parses a full settings payload. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(raw).map(Self::sanitized)
    }
}

/// Owns the current settings and fans out replacements to subscribers.
pub struct ConfigStore {
    repository: Arc<dyn SettingsRepository>,
    current: Mutex<UpsellSettings>,
    sender: broadcast::Sender<UpsellSettings>,
}

impl ConfigStore {
    /// Reads the persisted settings, falling back to defaults when they are
    /// missing or unreadable.
    pub fn load(repository: Arc<dyn SettingsRepository>) -> Self {
        let settings = match repository.read(SETTINGS_KEY) {
            Ok(Some(raw)) => match UpsellSettings::from_json(&raw) {
                Ok(settings) => settings,
                Err(error) => {
                    warn!(
                        event_name = "upsell.settings.fallback_defaults",
                        error = %error,
                        "persisted upsell settings are malformed; using defaults"
                    );
                    UpsellSettings::default()
                }
            },
            Ok(None) => UpsellSettings::default(),
            Err(error) => {
                warn!(
                    event_name = "upsell.settings.fallback_defaults",
                    error = %error,
                    "could not read upsell settings; using defaults"
                );
                UpsellSettings::default()
            }
        };

        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { repository, current: Mutex::new(settings), sender }
    }

    pub fn current(&self) -> UpsellSettings {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn subscribe(&self) -> SettingsSubscription {
        SettingsSubscription { receiver: self.sender.subscribe() }
    }

    /// Persists `settings` and pushes them to every subscriber.
    pub fn publish(&self, settings: UpsellSettings) -> Result<(), ApplicationError> {
        let settings = settings.sanitized();
        let raw = serde_json::to_string(&settings)
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        self.repository.write(SETTINGS_KEY, &raw)?;

        info!(
            event_name = "upsell.settings.published",
            enabled = settings.enabled,
            max_suggestions = settings.max_suggestions,
            "upsell settings persisted"
        );
        self.replace(settings);
        Ok(())
    }

    /// Applies a raw payload received from the change channel. Malformed
    /// payloads are logged and ignored; returns whether the payload applied.
    pub fn publish_payload(&self, raw: &str) -> bool {
        match UpsellSettings::from_json(raw) {
            Ok(settings) => {
                self.replace(settings);
                true
            }
            Err(error) => {
                warn!(
                    event_name = "upsell.settings.payload_rejected",
                    error = %error,
                    "ignoring malformed upsell settings payload"
                );
                false
            }
        }
    }

    fn replace(&self, settings: UpsellSettings) {
        match self.current.lock() {
            Ok(mut current) => *current = settings.clone(),
            Err(poisoned) => *poisoned.into_inner() = settings.clone(),
        }
        // No subscribers is fine; the current value is still updated.
        let _ = self.sender.send(settings);
    }
}

/// Receiving end of the settings channel. Dropping it (or calling
/// [`SettingsSubscription::unsubscribe`]) stops delivery.
pub struct SettingsSubscription {
    receiver: broadcast::Receiver<UpsellSettings>,
}

impl SettingsSubscription {
    /// Drains pending payloads and returns the most recent one, if any.
    pub fn latest(&mut self) -> Option<UpsellSettings> {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(settings) => latest = Some(settings),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
            }
        }
    }

    /// Waits for the next payload; `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<UpsellSettings> {
        loop {
            match self.receiver.recv().await {
                Ok(settings) => return Some(settings),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
