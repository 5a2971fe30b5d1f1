use std::path::PathBuf;

use upsell_core::config::AppConfig;
use upsell_core::errors::ApplicationError;
use upsell_core::suggestions::{format_price, RankedSuggestions, SuggestionEngine};

use crate::commands::snapshot::{load_cart, load_catalog, open_store};
use crate::commands::CommandResult;

#[derive(Clone, Debug)]
pub struct SuggestArgs {
    pub cart: PathBuf,
    pub catalog: PathBuf,
    pub json: bool,
}

pub fn run(args: &SuggestArgs, config: &AppConfig) -> CommandResult {
    match rank(args, config) {
        Ok(ranked) if args.json => CommandResult::success_with(
            "suggest",
            format!("{} suggestion(s)", ranked.len()),
            &ranked,
        ),
        Ok(ranked) => CommandResult::text(render(&ranked)),
        Err(error) => CommandResult::from_error("suggest", &error),
    }
}

fn rank(args: &SuggestArgs, config: &AppConfig) -> Result<RankedSuggestions, ApplicationError> {
    let cart = load_cart(&args.cart)?;
    let catalog = load_catalog(&args.catalog)?;
    let store = open_store(config);

    let engine = SuggestionEngine::new(catalog, store.current());
    let ranked = engine.rank(&cart);
    tracing::info!(
        event_name = "upsell.cli.suggest",
        fingerprint = %ranked.fingerprint,
        count = ranked.len(),
        "ranked suggestions for cart snapshot"
    );
    Ok(ranked)
}

fn render(ranked: &RankedSuggestions) -> String {
    if ranked.is_empty() {
        return "no suggestions for this cart".to_string();
    }

    let mut lines = vec![format!("suggestions (cart {}):", ranked.fingerprint)];
    for (position, suggestion) in ranked.suggestions.iter().enumerate() {
        let delta = suggestion
            .price_delta
            .map(|delta| format!(" (+{})", format_price(delta)))
            .unwrap_or_default();
        lines.push(format!(
            "{}. [{}] {}{} - {} ({})",
            position + 1,
            suggestion.trigger.as_str(),
            suggestion.product.name,
            delta,
            suggestion.message,
            suggestion.display_confidence(),
        ));
    }
    lines.join("\n")
}
