//! Contextual Upsell Suggestions
//!
//! Rule-based recommendations built from the current cart and the product
//! catalog. Rules are evaluated in declaration order, candidates below the
//! confidence threshold are dropped, and the rest are ranked by priority and
//! truncated to the configured maximum.

mod engine;
mod memo;
mod rules;
mod scoring;
mod types;

pub use engine::{format_price, generate_candidates, render_message, SuggestionEngine};
pub use memo::RecomputeMemo;
pub use rules::{RuleRegistry, BASE_VARIANT, FLAGSHIP_VARIANT};
pub use scoring::{RankingPolicy, SuggestionRanker};
pub use types::*;

/// Maximum suggestions to return
pub const DEFAULT_MAX_SUGGESTIONS: usize = 2;

/// Minimum confidence for a suggestion to be shown
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;
