//! Types for the Suggestion Engine

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::{Cart, CartFingerprint};
use crate::domain::catalog::Catalog;
use crate::domain::product::{Product, ProductCategory};
use crate::settings::UpsellSettings;

/// Marketing framing attached to a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCategory {
    /// "Most customers pick this"
    SocialProof,
    /// Scarcity or time pressure
    Urgency,
    /// Goes well with what is already in the cart
    Affinity,
    /// Saves money or adds value
    Value,
}

impl TriggerCategory {
    pub const ALL: [TriggerCategory; 4] =
        [Self::SocialProof, Self::Urgency, Self::Affinity, Self::Value];

    /// Wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerCategory::SocialProof => "social_proof",
            TriggerCategory::Urgency => "urgency",
            TriggerCategory::Affinity => "affinity",
            TriggerCategory::Value => "value",
        }
    }
}

impl std::str::FromStr for TriggerCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "social_proof" => Ok(Self::SocialProof),
            "urgency" => Ok(Self::Urgency),
            "affinity" => Ok(Self::Affinity),
            "value" => Ok(Self::Value),
            other => Err(format!(
                "unknown trigger category `{other}` (expected social_proof|urgency|affinity|value)"
            )),
        }
    }
}

/// Cart-shape predicate deciding whether a rule applies
#[derive(Debug, Clone, PartialEq)]
pub enum CartCondition {
    /// No line's product name contains the variant marker
    LacksVariant { variant: &'static str },
    /// Some line of the category has a product name containing the variant marker
    ContainsVariant { category: ProductCategory, variant: &'static str },
    /// Exactly one line and nothing of the given category
    SingleLineWithout { category: ProductCategory },
    /// Something of `present` but nothing of `absent`
    PairMissing { present: ProductCategory, absent: ProductCategory },
    /// Cart total is positive and below the configured low-value threshold
    TotalBelowLowValueThreshold,
    /// Cart total strictly above a fixed amount
    TotalAbove { threshold: Decimal },
    /// Something of the given category
    ContainsCategory { category: ProductCategory },
}

/// Catalog lookup producing the product a template promotes
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateMatcher {
    /// First product of the category whose name contains the variant marker
    Variant { category: ProductCategory, variant: &'static str },
    /// The larger variant, priced against the matched smaller cart line
    NextVariant { category: ProductCategory, from: &'static str, to: &'static str },
    /// First product of the category
    FirstInCategory { category: ProductCategory },
    /// First product of the category priced above half of the cart total
    AboveHalfTotal { category: ProductCategory },
    /// First product whose original price exceeds its current price
    FirstDiscounted,
    /// Paid add-on synthesized as a virtual product
    Complement { name: &'static str },
}

/// One way a rule can turn into a suggestion
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionTemplate {
    pub matcher: CandidateMatcher,
    /// Message with optional `{price}` and `{productName}` placeholders
    pub message: &'static str,
    pub trigger: TriggerCategory,
    /// Higher is more important
    pub priority: i32,
    /// Baseline confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Fixed price shown instead of the candidate price (complements)
    pub extra_price: Option<Decimal>,
}

/// A named condition paired with the templates it unlocks
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRule {
    pub id: &'static str,
    pub name: &'static str,
    pub condition: CartCondition,
    pub templates: Vec<SuggestionTemplate>,
}

/// Read-only inputs shared by every condition and matcher in one computation
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub cart: &'a Cart,
    pub catalog: &'a Catalog,
    pub settings: &'a UpsellSettings,
}

/// Product found by a matcher, before message resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub product: Product,
    pub price_delta: Option<Decimal>,
}

/// A resolved suggestion ready to be ranked and shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Rule that produced this suggestion
    pub rule_id: String,
    /// Catalog or virtual product being promoted
    pub product: Product,
    /// Message with placeholders substituted
    pub message: String,
    pub trigger: TriggerCategory,
    pub priority: i32,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Extra cost compared to the item it upgrades, when applicable
    pub price_delta: Option<Decimal>,
}

impl Suggestion {
    /// Get display percentage
    pub fn display_confidence(&self) -> String {
        format!("{:.0}% match", self.confidence * 100.0)
    }
}

/// The authoritative ranked list for one cart state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSuggestions {
    pub fingerprint: String,
    pub suggestions: Vec<Suggestion>,
    pub computed_at: DateTime<Utc>,
}

impl RankedSuggestions {
    pub fn empty(fingerprint: &CartFingerprint) -> Self {
        Self {
            fingerprint: fingerprint.as_str().to_owned(),
            suggestions: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }
}

/// Result of asking the engine for suggestions
#[derive(Debug, Clone)]
pub enum MemoOutcome {
    /// The cart changed and the list was recomputed
    Fresh(Arc<RankedSuggestions>),
    /// Same fingerprint as last time; the previous list is returned untouched
    Unchanged(Arc<RankedSuggestions>),
}

impl MemoOutcome {
    pub fn suggestions(&self) -> &Arc<RankedSuggestions> {
        match self {
            MemoOutcome::Fresh(ranked) | MemoOutcome::Unchanged(ranked) => ranked,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, MemoOutcome::Fresh(_))
    }
}
