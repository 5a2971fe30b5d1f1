//! The owning view of the upsell engine: keeps the latest cart, catalog and
//! settings, feeds the rotator and exposes accept/dismiss to the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::cart::Cart;
use crate::domain::catalog::Catalog;
use crate::domain::product::Product;
use crate::presentation::{effective_period, lock, RotationState, RotationTask, Rotator};
use crate::settings::{ConfigStore, SettingsSubscription, UpsellSettings};
use crate::suggestions::{MemoOutcome, Suggestion, SuggestionEngine};

/// Cart-management collaborator that actually adds accepted items.
pub trait CartSink: Send + Sync {
    fn add_item(&self, product: &Product);
}

#[derive(Clone, Default)]
pub struct InMemoryCartSink {
    added: Arc<Mutex<Vec<Product>>>,
}

impl InMemoryCartSink {
    pub fn added(&self) -> Vec<Product> {
        match self.added.lock() {
            Ok(added) => added.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl CartSink for InMemoryCartSink {
    fn add_item(&self, product: &Product) {
        match self.added.lock() {
            Ok(mut added) => added.push(product.clone()),
            Err(poisoned) => poisoned.into_inner().push(product.clone()),
        }
    }
}

pub struct UpsellSession {
    engine: SuggestionEngine,
    subscription: SettingsSubscription,
    rotator: Arc<Mutex<Rotator>>,
    rotation: Option<RotationTask>,
    period: Duration,
    cart: Cart,
    cart_sink: Arc<dyn CartSink>,
}

impl UpsellSession {
    pub fn new(
        store: &ConfigStore,
        catalog: Catalog,
        cart_sink: Arc<dyn CartSink>,
        period: Duration,
    ) -> Self {
        let settings = store.current();
        let mut rotator = Rotator::new();
        rotator.set_enabled(settings.enabled);

        Self {
            engine: SuggestionEngine::new(catalog, settings),
            subscription: store.subscribe(),
            rotator: Arc::new(Mutex::new(rotator)),
            rotation: None,
            period: effective_period(period),
            cart: Cart::default(),
            cart_sink,
        }
    }

    pub fn engine(&self) -> &SuggestionEngine {
        &self.engine
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn state(&self) -> RotationState {
        lock(&self.rotator).state()
    }

    pub fn current(&self) -> Option<Suggestion> {
        lock(&self.rotator).current().cloned()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a periodic rotation task is currently alive.
    pub fn is_rotating(&self) -> bool {
        self.rotation.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn update_cart(&mut self, cart: Cart) -> MemoOutcome {
        self.cart = cart;
        self.refresh()
    }

    pub fn update_catalog(&mut self, catalog: Catalog) -> MemoOutcome {
        self.engine.set_catalog(catalog);
        self.refresh()
    }

    pub fn apply_settings(&mut self, settings: UpsellSettings) -> MemoOutcome {
        let enabled = settings.enabled;
        self.engine.apply_settings(settings);
        lock(&self.rotator).set_enabled(enabled);
        self.refresh()
    }

    /// Applies the newest payload from the settings channel, if one arrived.
    pub fn sync_settings(&mut self) -> Option<MemoOutcome> {
        let settings = self.subscription.latest()?;
        debug!(event_name = "upsell.session.settings_changed", "applying published settings");
        Some(self.apply_settings(settings))
    }

    /// Advances the displayed suggestion by hand, outside the timer.
    pub fn tick(&mut self) -> RotationState {
        lock(&self.rotator).tick()
    }

    /// Hands the displayed product to the cart collaborator.
    pub fn accept(&mut self) -> Option<Product> {
        let product = self.current()?.product;
        info!(
            event_name = "upsell.session.accepted",
            product_id = product.id.as_str(),
            "upsell suggestion accepted"
        );
        self.cart_sink.add_item(&product);
        Some(product)
    }

    pub fn dismiss(&mut self) {
        lock(&self.rotator).dismiss();
        self.stop_rotation();
        info!(event_name = "upsell.session.dismissed", "upsell suggestion dismissed");
    }

    /// Stops the periodic task; call when the owning view goes away.
    pub fn shutdown(&mut self) {
        self.stop_rotation();
    }

    fn refresh(&mut self) -> MemoOutcome {
        let outcome = self.engine.suggestions_for(&self.cart);
        if let MemoOutcome::Fresh(ranked) = &outcome {
            let (changed, needs_ticks) = {
                let mut rotator = lock(&self.rotator);
                let changed = !rotator.holds(&ranked.suggestions);
                if changed {
                    rotator.replace(Arc::clone(ranked));
                }
                (changed, rotator.needs_ticks())
            };
            if changed {
                self.stop_rotation();
            } else {
                debug!(
                    event_name = "upsell.session.list_unchanged",
                    fingerprint = ranked.fingerprint.as_str(),
                    "recomputed list is identical; rotation left as is"
                );
            }
            self.ensure_rotation(needs_ticks);
        }
        outcome
    }

    /// Keeps a live task exactly while the rotator has something to cycle.
    fn ensure_rotation(&mut self, needs_ticks: bool) {
        if !needs_ticks {
            self.stop_rotation();
            return;
        }
        if self.is_rotating() {
            return;
        }
        // Without a runtime the caller drives rotation through `tick`.
        if tokio::runtime::Handle::try_current().is_ok() {
            self.rotation = Some(RotationTask::spawn(Arc::clone(&self.rotator), self.period));
        }
    }

    fn stop_rotation(&mut self) {
        if let Some(task) = self.rotation.take() {
            task.cancel();
        }
    }
}

impl Drop for UpsellSession {
    fn drop(&mut self) {
        self.stop_rotation();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::{InMemoryCartSink, UpsellSession};
    use crate::domain::cart::{Cart, CartLine};
    use crate::domain::catalog::Catalog;
    use crate::domain::product::{Product, ProductCategory};
    use crate::presentation::{RotationState, DEFAULT_ROTATION_PERIOD};
    use crate::settings::{ConfigStore, InMemorySettingsRepository, UpsellSettings};

    fn product(id: &str, name: &str, category: ProductCategory, cents: i64) -> Product {
        Product::new(id, name, category, Decimal::new(cents, 2))
    }

    fn acai_300() -> Product {
        product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500)
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            acai_300(),
            product("acai-500", "Açaí 500g", ProductCategory::Acai, 1700),
            product("combo-casal", "Combo Casal", ProductCategory::Combo, 3990),
        ])
    }

    fn store() -> ConfigStore {
        ConfigStore::load(Arc::new(InMemorySettingsRepository::default()))
    }

    fn cart() -> Cart {
        Cart::new(vec![CartLine::new("l-1", acai_300(), 1)])
    }

    fn cart_with_combo() -> Cart {
        Cart::new(vec![
            CartLine::new("l-1", acai_300(), 1),
            CartLine::new(
                "l-2",
                product("combo-casal", "Combo Casal", ProductCategory::Combo, 3990),
                1,
            ),
        ])
    }

    fn session(store: &ConfigStore, sink: &InMemoryCartSink) -> UpsellSession {
        UpsellSession::new(store, catalog(), Arc::new(sink.clone()), Duration::from_secs(8))
    }

    #[test]
    fn accept_delegates_to_the_cart_collaborator() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);

        session.update_cart(cart());
        let accepted = session.accept().expect("a suggestion should be showing");

        assert_eq!(accepted.id.as_str(), "acai-500");
        assert_eq!(sink.added(), vec![accepted]);
        assert_eq!(session.cart().len(), 1, "session never mutates the cart itself");
    }

    #[test]
    fn dismissal_survives_unchanged_recomputes() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);

        session.update_cart(cart());
        session.dismiss();
        assert_eq!(session.state(), RotationState::Idle);

        let outcome = session.update_cart(cart());
        assert!(!outcome.is_fresh());
        assert_eq!(session.state(), RotationState::Idle);
        assert!(session.accept().is_none());

        let outcome = session.update_cart(Cart::new(vec![CartLine::new("l-1", acai_300(), 2)]));
        assert!(outcome.is_fresh());
        assert_eq!(session.state(), RotationState::Idle, "same ranked list keeps the dismissal");

        session.update_cart(cart_with_combo());
        assert_eq!(session.state(), RotationState::Showing(0));
    }

    #[test]
    fn dismissal_survives_settings_that_leave_the_list_alone() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);
        let before = session.update_cart(cart()).suggestions().suggestions.clone();
        session.dismiss();

        store
            .publish(UpsellSettings {
                low_value_threshold: Decimal::new(2600, 2),
                ..UpsellSettings::default()
            })
            .expect("publish");
        let outcome = session.sync_settings().expect("settings change should be observed");

        assert!(outcome.is_fresh());
        assert_eq!(outcome.suggestions().suggestions, before);
        assert_eq!(session.state(), RotationState::Idle);
        assert!(session.current().is_none());
    }

    #[test]
    fn published_settings_rederive_the_list() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);
        session.update_cart(cart());
        session.tick();
        assert_eq!(session.state(), RotationState::Showing(1));

        store.publish(UpsellSettings { max_suggestions: 3, ..UpsellSettings::default() }).expect("publish");
        let outcome = session.sync_settings().expect("settings change should be observed");

        assert!(outcome.is_fresh());
        assert_eq!(outcome.suggestions().len(), 3);
        assert_eq!(session.state(), RotationState::Showing(0));
        assert!(session.sync_settings().is_none());
    }

    #[test]
    fn global_disable_keeps_the_rotator_idle() {
        let store = store();
        store.publish(UpsellSettings { enabled: false, ..UpsellSettings::default() }).expect("publish");
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);

        let outcome = session.update_cart(cart());

        assert!(outcome.suggestions().is_empty());
        assert_eq!(session.state(), RotationState::Idle);
        assert!(session.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_task_follows_the_session_lifecycle() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);

        session.update_cart(cart());
        assert!(session.is_rotating());

        tokio::time::advance(Duration::from_secs(8)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.state(), RotationState::Showing(1));

        session.shutdown();
        tokio::time::advance(Duration::from_secs(8)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.state(), RotationState::Showing(1));
        assert!(!session.is_rotating());
    }

    #[tokio::test(start_paused = true)]
    async fn new_list_mid_rotation_restarts_from_the_top() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session = session(&store, &sink);

        session.update_cart(cart());
        tokio::time::advance(Duration::from_secs(8)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.state(), RotationState::Showing(1));

        let outcome = session.update_cart(cart_with_combo());
        assert!(outcome.is_fresh());
        assert_eq!(session.state(), RotationState::Showing(0));
        assert!(session.is_rotating());

        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.state(), RotationState::Showing(0), "old task must not tick");

        tokio::time::advance(Duration::from_secs(4)).await;
        tokio::task::yield_now().await;
        assert_eq!(session.state(), RotationState::Showing(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_session_rotates_at_the_default_pace() {
        let store = store();
        let sink = InMemoryCartSink::default();
        let mut session =
            UpsellSession::new(&store, catalog(), Arc::new(sink.clone()), Duration::ZERO);
        assert_eq!(session.period(), DEFAULT_ROTATION_PERIOD);

        session.update_cart(cart());
        tokio::time::advance(DEFAULT_ROTATION_PERIOD).await;
        tokio::task::yield_now().await;

        assert!(session.is_rotating());
        assert_eq!(session.state(), RotationState::Showing(1));
    }
}
