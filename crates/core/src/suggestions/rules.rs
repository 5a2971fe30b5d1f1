//! Rule registry and the pure evaluation of conditions and matchers

use rust_decimal::Decimal;

use super::types::*;
use crate::domain::product::{Product, ProductCategory};

/// Flagship cup size promoted when missing from the cart.
pub const FLAGSHIP_VARIANT: &str = "500g";
/// Entry cup size that qualifies for an upgrade.
pub const BASE_VARIANT: &str = "300g";

/// Paid complements offered on top of açaí, with their framing.
struct ComplementSeed {
    name: &'static str,
    price_cents: i64,
    trigger: TriggerCategory,
    confidence: f64,
    message: &'static str,
}

const COMPLEMENT_SEEDS: &[ComplementSeed] = &[
    ComplementSeed {
        name: "Nutella",
        price_cents: 400,
        trigger: TriggerCategory::Affinity,
        confidence: 0.75,
        message: "Açaí com {productName} é combinação perfeita! +{price}",
    },
    ComplementSeed {
        name: "Leite Ninho",
        price_cents: 300,
        trigger: TriggerCategory::SocialProof,
        confidence: 0.70,
        message: "{productName} é o complemento mais pedido da casa! +{price}",
    },
    ComplementSeed {
        name: "Morango",
        price_cents: 250,
        trigger: TriggerCategory::Urgency,
        confidence: 0.60,
        message: "Últimas porções de {productName} fresquinho hoje! +{price}",
    },
    ComplementSeed {
        name: "Paçoca",
        price_cents: 200,
        trigger: TriggerCategory::Value,
        confidence: 0.55,
        message: "Adicione {productName} por apenas +{price}",
    },
];

/// Declaration-ordered, immutable set of suggestion rules
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<SuggestionRule>,
}

impl RuleRegistry {
    pub fn new(rules: Vec<SuggestionRule>) -> Self {
        Self { rules }
    }

    /// The rules the shop runs with.
    pub fn standard() -> Self {
        Self::new(standard_rules())
    }

    pub fn rules(&self) -> &[SuggestionRule] {
        &self.rules
    }

    pub fn find(&self, rule_id: &str) -> Option<&SuggestionRule> {
        self.rules.iter().find(|rule| rule.id == rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn template(
    matcher: CandidateMatcher,
    message: &'static str,
    trigger: TriggerCategory,
    priority: i32,
    confidence: f64,
) -> SuggestionTemplate {
    SuggestionTemplate { matcher, message, trigger, priority, confidence, extra_price: None }
}

fn standard_rules() -> Vec<SuggestionRule> {
    vec![
        SuggestionRule {
            id: "flagship-size",
            name: "Promote the flagship cup",
            condition: CartCondition::LacksVariant { variant: FLAGSHIP_VARIANT },
            templates: vec![template(
                CandidateMatcher::Variant {
                    category: ProductCategory::Acai,
                    variant: FLAGSHIP_VARIANT,
                },
                "O {productName} é o mais pedido da casa! Leve por {price}.",
                TriggerCategory::SocialProof,
                8,
                0.80,
            )],
        },
        SuggestionRule {
            id: "size-upgrade",
            name: "Upgrade the base cup",
            condition: CartCondition::ContainsVariant {
                category: ProductCategory::Acai,
                variant: BASE_VARIANT,
            },
            templates: vec![template(
                CandidateMatcher::NextVariant {
                    category: ProductCategory::Acai,
                    from: BASE_VARIANT,
                    to: FLAGSHIP_VARIANT,
                },
                "7 em cada 10 clientes preferem o {productName} ({price}). Faça o upgrade!",
                TriggerCategory::SocialProof,
                10,
                0.85,
            )],
        },
        SuggestionRule {
            id: "bundle-single-item",
            name: "Offer a combo for single-item carts",
            condition: CartCondition::SingleLineWithout { category: ProductCategory::Combo },
            templates: vec![template(
                CandidateMatcher::FirstInCategory { category: ProductCategory::Combo },
                "Economize levando o {productName} por {price}!",
                TriggerCategory::Value,
                9,
                0.75,
            )],
        },
        SuggestionRule {
            id: "drink-pairing",
            name: "Pair açaí with a drink",
            condition: CartCondition::PairMissing {
                present: ProductCategory::Acai,
                absent: ProductCategory::Bebidas,
            },
            templates: vec![template(
                CandidateMatcher::FirstInCategory { category: ProductCategory::Bebidas },
                "Que tal um {productName} para acompanhar? Só {price}.",
                TriggerCategory::Affinity,
                6,
                0.70,
            )],
        },
        SuggestionRule {
            id: "milkshake-affinity",
            name: "Pair açaí with a milkshake",
            condition: CartCondition::PairMissing {
                present: ProductCategory::Acai,
                absent: ProductCategory::Milkshake,
            },
            templates: vec![template(
                CandidateMatcher::FirstInCategory { category: ProductCategory::Milkshake },
                "Quem pede açaí também adora o {productName}.",
                TriggerCategory::Affinity,
                5,
                0.65,
            )],
        },
        SuggestionRule {
            id: "low-value-urgency",
            name: "Lift small orders",
            condition: CartCondition::TotalBelowLowValueThreshold,
            templates: vec![template(
                CandidateMatcher::AboveHalfTotal { category: ProductCategory::Acai },
                "Aproveite agora: adicione {productName} por {price} e complete seu pedido!",
                TriggerCategory::Urgency,
                7,
                0.70,
            )],
        },
        SuggestionRule {
            id: "premium-high-value",
            name: "Show a discounted premium item to big orders",
            condition: CartCondition::TotalAbove { threshold: Decimal::new(5000, 2) },
            templates: vec![template(
                CandidateMatcher::FirstDiscounted,
                "Oferta especial: {productName} com desconto por {price}.",
                TriggerCategory::Value,
                6,
                0.80,
            )],
        },
        SuggestionRule {
            id: "paid-complements",
            name: "Offer paid complements on açaí",
            condition: CartCondition::ContainsCategory { category: ProductCategory::Acai },
            templates: COMPLEMENT_SEEDS
                .iter()
                .map(|seed| SuggestionTemplate {
                    matcher: CandidateMatcher::Complement { name: seed.name },
                    message: seed.message,
                    trigger: seed.trigger,
                    priority: 4,
                    confidence: seed.confidence,
                    extra_price: Some(Decimal::new(seed.price_cents, 2)),
                })
                .collect(),
        },
    ]
}

impl CartCondition {
    pub fn holds(&self, context: &RuleContext<'_>) -> bool {
        let cart = context.cart;
        match self {
            CartCondition::LacksVariant { variant } => !cart.contains_name(variant),
            CartCondition::ContainsVariant { category, variant } => cart
                .lines()
                .iter()
                .any(|line| line.product.category == *category && line.product.name_contains(variant)),
            CartCondition::SingleLineWithout { category } => {
                cart.len() == 1 && !cart.contains_category(*category)
            }
            CartCondition::PairMissing { present, absent } => {
                cart.contains_category(*present) && !cart.contains_category(*absent)
            }
            CartCondition::TotalBelowLowValueThreshold => {
                let total = cart.total();
                total > Decimal::ZERO && total < context.settings.low_value_threshold
            }
            CartCondition::TotalAbove { threshold } => cart.total() > *threshold,
            CartCondition::ContainsCategory { category } => cart.contains_category(*category),
        }
    }
}

impl SuggestionTemplate {
    /// Runs the matcher. Never returns something the cart already holds.
    pub fn match_candidate(&self, context: &RuleContext<'_>) -> Option<Candidate> {
        let cart = context.cart;
        let mut available = context.catalog.active().filter(|product| !cart.already_has(product));

        let candidate = match &self.matcher {
            CandidateMatcher::Variant { category, variant } => available
                .find(|product| product.category == *category && product.name_contains(variant))
                .map(plain),
            CandidateMatcher::NextVariant { category, from, to } => {
                let base = cart.lines().iter().find(|line| {
                    line.product.category == *category && line.product.name_contains(from)
                })?;
                available
                    .find(|product| product.category == *category && product.name_contains(to))
                    .map(|product| Candidate {
                        price_delta: Some(product.price - base.product.price),
                        product: product.clone(),
                    })
            }
            CandidateMatcher::FirstInCategory { category } => {
                available.find(|product| product.category == *category).map(plain)
            }
            CandidateMatcher::AboveHalfTotal { category } => {
                let floor = cart.total() * Decimal::new(5, 1);
                available
                    .find(|product| product.category == *category && product.price > floor)
                    .map(plain)
            }
            CandidateMatcher::FirstDiscounted => {
                available.find(|product| product.is_discounted()).map(plain)
            }
            CandidateMatcher::Complement { name } => {
                let price = self.extra_price?;
                let product = Product::virtual_complement(name, price);
                (!cart.already_has(&product)).then_some(Candidate { product, price_delta: None })
            }
        }?;

        (!cart.already_has(&candidate.product)).then_some(candidate)
    }
}

fn plain(product: &Product) -> Candidate {
    Candidate { product: product.clone(), price_delta: None }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::cart::{Cart, CartLine, Complement};
    use crate::domain::catalog::Catalog;
    use crate::settings::UpsellSettings;

    fn product(id: &str, name: &str, category: ProductCategory, cents: i64) -> Product {
        Product::new(id, name, category, Decimal::new(cents, 2))
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500),
            product("acai-500", "Açaí 500g", ProductCategory::Acai, 1700),
            product("combo-casal", "Combo Casal", ProductCategory::Combo, 3990),
            product("suco-laranja", "Suco de Laranja", ProductCategory::Bebidas, 800),
            product("shake-morango", "Milkshake de Morango", ProductCategory::Milkshake, 1600),
            product("acai-1l", "Açaí 1L", ProductCategory::Acai, 3500)
                .with_original_price(Decimal::new(4200, 2)),
        ])
    }

    fn rule(id: &str) -> SuggestionRule {
        RuleRegistry::standard().find(id).cloned().expect("rule should be registered")
    }

    #[test]
    fn registry_keeps_declaration_order() {
        let registry = RuleRegistry::standard();
        let ids = registry.rules().iter().map(|rule| rule.id).collect::<Vec<_>>();

        assert_eq!(
            ids,
            vec![
                "flagship-size",
                "size-upgrade",
                "bundle-single-item",
                "drink-pairing",
                "milkshake-affinity",
                "low-value-urgency",
                "premium-high-value",
                "paid-complements",
            ]
        );
        assert!(registry.rules().iter().all(|rule| !rule.templates.is_empty()));
    }

    #[test]
    fn flagship_rule_skips_carts_that_already_have_it() {
        let catalog = catalog();
        let settings = UpsellSettings::default();
        let with_flagship = Cart::new(vec![CartLine::new(
            "l-1",
            product("acai-500", "Açaí 500g", ProductCategory::Acai, 1700),
            1,
        )]);
        let context = RuleContext { cart: &with_flagship, catalog: &catalog, settings: &settings };

        assert!(!rule("flagship-size").condition.holds(&context));
    }

    #[test]
    fn upgrade_reports_price_delta_against_the_base_line() {
        let catalog = catalog();
        let settings = UpsellSettings::default();
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500),
            1,
        )]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };
        let upgrade = rule("size-upgrade");

        assert!(upgrade.condition.holds(&context));
        let candidate =
            upgrade.templates[0].match_candidate(&context).expect("upgrade candidate expected");
        assert_eq!(candidate.product.id.as_str(), "acai-500");
        assert_eq!(candidate.price_delta, Some(Decimal::new(200, 2)));
    }

    #[test]
    fn low_value_matcher_requires_price_above_half_the_total() {
        let catalog = Catalog::new(vec![
            product("acai-mini", "Açaí Mini", ProductCategory::Acai, 700),
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1000),
        ]);
        let settings = UpsellSettings::default();
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("shake", "Milkshake", ProductCategory::Milkshake, 1500),
            1,
        )]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };
        let urgency = rule("low-value-urgency");

        assert!(urgency.condition.holds(&context));
        let candidate = urgency.templates[0].match_candidate(&context).expect("candidate");
        assert_eq!(candidate.product.id.as_str(), "acai-300");
    }

    #[test]
    fn low_value_threshold_follows_settings() {
        let catalog = catalog();
        let settings = UpsellSettings {
            low_value_threshold: Decimal::new(1000, 2),
            ..UpsellSettings::default()
        };
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500),
            1,
        )]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };

        assert!(!rule("low-value-urgency").condition.holds(&context));
    }

    #[test]
    fn discounted_matcher_picks_first_marked_down_product() {
        let catalog = catalog();
        let settings = UpsellSettings::default();
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("combo-casal", "Combo Casal", ProductCategory::Combo, 3990),
            2,
        )]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };
        let premium = rule("premium-high-value");

        assert!(premium.condition.holds(&context));
        let candidate = premium.templates[0].match_candidate(&context).expect("candidate");
        assert_eq!(candidate.product.id.as_str(), "acai-1l");
    }

    #[test]
    fn complements_already_selected_are_not_offered_again() {
        let catalog = catalog();
        let settings = UpsellSettings::default();
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500),
            1,
        )
        .with_complements(vec![Complement::new("nutella", Decimal::new(400, 2))])]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };
        let complements = rule("paid-complements");

        let offered = complements
            .templates
            .iter()
            .filter_map(|template| template.match_candidate(&context))
            .map(|candidate| candidate.product.name)
            .collect::<Vec<_>>();

        assert_eq!(offered, vec!["Leite Ninho", "Morango", "Paçoca"]);
    }

    #[test]
    fn inactive_products_are_never_matched() {
        let catalog = Catalog::new(vec![
            product("combo-casal", "Combo Casal", ProductCategory::Combo, 3990).inactive()
        ]);
        let settings = UpsellSettings::default();
        let cart = Cart::new(vec![CartLine::new(
            "l-1",
            product("acai-300", "Açaí 300g", ProductCategory::Acai, 1500),
            1,
        )]);
        let context = RuleContext { cart: &cart, catalog: &catalog, settings: &settings };

        assert!(rule("bundle-single-item").templates[0].match_candidate(&context).is_none());
    }
}
