//! Confidence filtering and ranking of generated candidates

use std::collections::HashSet;

use super::types::*;

/// Ranking policy applied to the generated candidates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    /// Candidates below this confidence are dropped
    pub confidence_threshold: f64,
    /// Maximum number of suggestions kept
    pub max_suggestions: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: super::DEFAULT_CONFIDENCE_THRESHOLD,
            max_suggestions: super::DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

/// Filters, orders and truncates candidate suggestions
#[derive(Debug, Clone, Default)]
pub struct SuggestionRanker {
    policy: RankingPolicy,
}

impl SuggestionRanker {
    pub fn new(policy: RankingPolicy) -> Self {
        Self { policy }
    }

    /// Drops low-confidence candidates, sorts by priority descending, removes
    /// repeated products and keeps at most `max_suggestions`.
    ///
    /// The sort is stable: equal priorities keep generation order, which is
    /// rule declaration order followed by template order.
    pub fn rank(&self, mut candidates: Vec<Suggestion>) -> Vec<Suggestion> {
        candidates.retain(|suggestion| suggestion.confidence >= self.policy.confidence_threshold);

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut seen = HashSet::new();
        let mut ranked = Vec::with_capacity(self.policy.max_suggestions.min(candidates.len()));
        for suggestion in candidates {
            if ranked.len() == self.policy.max_suggestions {
                break;
            }
            if seen.insert(suggestion.product.id.clone()) {
                ranked.push(suggestion);
            }
        }

        ranked
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::product::{Product, ProductCategory};

    fn suggestion(id: &str, priority: i32, confidence: f64) -> Suggestion {
        Suggestion {
            rule_id: format!("rule-{id}"),
            product: Product::new(id, id.to_uppercase(), ProductCategory::Acai, Decimal::ONE),
            message: String::new(),
            trigger: TriggerCategory::Value,
            priority,
            confidence,
            price_delta: None,
        }
    }

    fn ids(ranked: &[Suggestion]) -> Vec<&str> {
        ranked.iter().map(|suggestion| suggestion.product.id.as_str()).collect()
    }

    #[test]
    fn drops_candidates_below_threshold() {
        let ranker = SuggestionRanker::new(RankingPolicy {
            confidence_threshold: 0.6,
            max_suggestions: 10,
        });

        let ranked = ranker.rank(vec![
            suggestion("a", 5, 0.59),
            suggestion("b", 1, 0.6),
            suggestion("c", 3, 0.95),
        ]);

        assert_eq!(ids(&ranked), vec!["c", "b"]);
        assert!(ranked.iter().all(|suggestion| suggestion.confidence >= 0.6));
    }

    #[test]
    fn equal_priorities_keep_generation_order() {
        let ranker = SuggestionRanker::new(RankingPolicy {
            confidence_threshold: 0.0,
            max_suggestions: 10,
        });

        let ranked = ranker.rank(vec![
            suggestion("first", 4, 0.7),
            suggestion("top", 9, 0.7),
            suggestion("second", 4, 0.9),
            suggestion("third", 4, 0.6),
        ]);

        assert_eq!(ids(&ranked), vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn truncates_to_max_suggestions() {
        let ranked = SuggestionRanker::default().rank(vec![
            suggestion("a", 1, 0.9),
            suggestion("b", 2, 0.9),
            suggestion("c", 3, 0.9),
        ]);

        assert_eq!(ids(&ranked), vec!["c", "b"]);
    }

    #[test]
    fn keeps_only_the_best_ranked_entry_per_product() {
        let ranker = SuggestionRanker::new(RankingPolicy {
            confidence_threshold: 0.0,
            max_suggestions: 2,
        });

        let mut upgrade = suggestion("acai-500", 10, 0.85);
        upgrade.price_delta = Some(Decimal::new(200, 2));
        let ranked =
            ranker.rank(vec![suggestion("acai-500", 8, 0.8), upgrade, suggestion("combo", 9, 0.75)]);

        assert_eq!(ids(&ranked), vec!["acai-500", "combo"]);
        assert_eq!(ranked[0].price_delta, Some(Decimal::new(200, 2)));
    }

    #[test]
    fn zero_max_yields_nothing() {
        let ranker = SuggestionRanker::new(RankingPolicy {
            confidence_threshold: 0.0,
            max_suggestions: 0,
        });

        assert!(ranker.rank(vec![suggestion("a", 1, 0.9)]).is_empty());
    }
}
