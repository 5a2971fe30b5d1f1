//! Suggestion Engine implementation

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use super::memo::RecomputeMemo;
use super::rules::RuleRegistry;
use super::scoring::{RankingPolicy, SuggestionRanker};
use super::types::*;
use crate::domain::cart::Cart;
use crate::domain::catalog::Catalog;
use crate::settings::UpsellSettings;

/// Formats an amount the way the storefront shows prices: `R$ 1.234,90`.
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let plain = format!("{:.2}", rounded.abs());
    let (units, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (index, digit) in units.chars().enumerate() {
        if index > 0 && (units.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("R$ {sign}{grouped},{cents}")
}

/// Substitutes `{price}` and `{productName}` in a template message.
pub fn render_message(template: &SuggestionTemplate, candidate: &Candidate) -> String {
    let price = template.extra_price.unwrap_or(candidate.product.price);
    template
        .message
        .replace("{price}", &format_price(price))
        .replace("{productName}", &candidate.product.name)
}

/// Evaluates every rule against the snapshot and resolves the templates that
/// apply into candidate suggestions, in declaration order.
pub fn generate_candidates(registry: &RuleRegistry, context: &RuleContext<'_>) -> Vec<Suggestion> {
    if context.cart.is_empty() {
        return Vec::new();
    }

    let triggers = &context.settings.triggers;
    let mut candidates = Vec::new();

    for rule in registry.rules() {
        if !rule.condition.holds(context) {
            continue;
        }

        for template in &rule.templates {
            if !triggers.is_enabled(template.trigger) {
                continue;
            }

            let Some(candidate) = template.match_candidate(context) else {
                continue;
            };

            candidates.push(Suggestion {
                rule_id: rule.id.to_owned(),
                message: render_message(template, &candidate),
                trigger: template.trigger,
                priority: template.priority,
                confidence: template.confidence,
                price_delta: candidate.price_delta,
                product: candidate.product,
            });
        }
    }

    candidates
}

/// The main suggestion engine
#[derive(Debug)]
pub struct SuggestionEngine {
    registry: RuleRegistry,
    catalog: Catalog,
    settings: UpsellSettings,
    memo: RecomputeMemo,
}

impl SuggestionEngine {
    /// Create a new engine with the standard rules
    pub fn new(catalog: Catalog, settings: UpsellSettings) -> Self {
        Self::with_registry(RuleRegistry::standard(), catalog, settings)
    }

    /// Create with a custom rule registry
    pub fn with_registry(registry: RuleRegistry, catalog: Catalog, settings: UpsellSettings) -> Self {
        Self { registry, catalog, settings, memo: RecomputeMemo::new() }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &UpsellSettings {
        &self.settings
    }

    pub fn memo(&self) -> &RecomputeMemo {
        &self.memo
    }

    /// Replaces the catalog snapshot; the next request recomputes.
    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        self.memo.invalidate();
    }

    /// Replaces the settings wholesale; the next request recomputes.
    pub fn apply_settings(&mut self, settings: UpsellSettings) {
        self.settings = settings.sanitized();
        self.memo.invalidate();
    }

    /// Computes the ranked list without touching the memo.
    pub fn rank(&self, cart: &Cart) -> RankedSuggestions {
        EngineView { registry: &self.registry, catalog: &self.catalog, settings: &self.settings }
            .rank(cart)
    }

    /// Returns the ranked list for `cart`, reusing the previous result when
    /// the cart fingerprint has not changed since the last computation.
    pub fn suggestions_for(&mut self, cart: &Cart) -> MemoOutcome {
        let fingerprint = cart.fingerprint();
        let Self { registry, catalog, settings, memo } = self;
        let engine_view = EngineView { registry, catalog, settings };

        let outcome = memo.get_or_compute(fingerprint, || engine_view.rank(cart));
        if !outcome.is_fresh() {
            debug!(
                event_name = "upsell.engine.memo_hit",
                fingerprint = outcome.suggestions().fingerprint.as_str(),
                "cart unchanged; reusing previous suggestions"
            );
        }
        outcome
    }
}

/// Borrowed view used so the memo can be borrowed mutably while ranking.
struct EngineView<'a> {
    registry: &'a RuleRegistry,
    catalog: &'a Catalog,
    settings: &'a UpsellSettings,
}

impl EngineView<'_> {
    fn rank(&self, cart: &Cart) -> RankedSuggestions {
        let fingerprint = cart.fingerprint();
        if !self.settings.enabled {
            return RankedSuggestions::empty(&fingerprint);
        }

        let context = RuleContext { cart, catalog: self.catalog, settings: self.settings };
        let candidates = generate_candidates(self.registry, &context);
        let generated = candidates.len();

        let suggestions = SuggestionRanker::new(RankingPolicy {
            confidence_threshold: self.settings.confidence_threshold,
            max_suggestions: self.settings.max_suggestions,
        })
        .rank(candidates);

        debug!(
            event_name = "upsell.engine.recomputed",
            fingerprint = fingerprint.as_str(),
            generated,
            kept = suggestions.len(),
            "recomputed upsell suggestions"
        );

        RankedSuggestions {
            fingerprint: fingerprint.as_str().to_owned(),
            suggestions,
            computed_at: Utc::now(),
        }
    }
}
