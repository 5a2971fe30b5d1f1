use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use upsell_core::config::AppConfig;
use upsell_core::domain::cart::Cart;
use upsell_core::domain::catalog::Catalog;
use upsell_core::domain::product::Product;
use upsell_core::errors::ApplicationError;
use upsell_core::presentation::RotationState;
use upsell_core::session::{InMemoryCartSink, UpsellSession};
use upsell_core::settings::ConfigStore;

use crate::commands::snapshot::{load_cart, load_catalog, open_store};
use crate::commands::CommandResult;

#[derive(Clone, Debug)]
pub struct RotateArgs {
    pub cart: PathBuf,
    pub catalog: PathBuf,
    pub ticks: usize,
    /// Accept whatever is showing after the last tick.
    pub accept: bool,
    /// Drive the rotation with the real timer instead of manual ticks.
    pub live: bool,
}

#[derive(Debug, Serialize)]
pub struct Frame {
    pub tick: usize,
    pub state: RotationState,
    pub product_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct RotationReport {
    period_secs: u64,
    frames: Vec<Frame>,
    accepted: Option<Product>,
}

pub fn run(args: &RotateArgs, config: &AppConfig) -> CommandResult {
    let (cart, catalog) = match load_inputs(args) {
        Ok(inputs) => inputs,
        Err(error) => return CommandResult::from_error("rotate", &error),
    };
    let store = open_store(config);
    let period = config.rotation.period();

    let report = if args.live {
        match simulate_live(args, &store, cart, catalog, period) {
            Ok(report) => report,
            Err(error) => return CommandResult::failure("rotate", "runtime", format!("{error:#}"), 1),
        }
    } else {
        simulate(args, &store, cart, catalog, period)
    };

    let message = format!("{} frame(s)", report.frames.len());
    CommandResult::success_with("rotate", message, report)
}

fn load_inputs(args: &RotateArgs) -> Result<(Cart, Catalog), ApplicationError> {
    Ok((load_cart(&args.cart)?, load_catalog(&args.catalog)?))
}

fn simulate(
    args: &RotateArgs,
    store: &ConfigStore,
    cart: Cart,
    catalog: Catalog,
    period: Duration,
) -> RotationReport {
    let sink = Arc::new(InMemoryCartSink::default());
    let mut session = UpsellSession::new(store, catalog, sink, period);
    session.update_cart(cart);

    let mut frames = vec![frame(0, &session)];
    for tick in 1..=args.ticks {
        session.tick();
        frames.push(frame(tick, &session));
    }

    let accepted = if args.accept { session.accept() } else { None };
    RotationReport { period_secs: period.as_secs(), frames, accepted }
}

fn simulate_live(
    args: &RotateArgs,
    store: &ConfigStore,
    cart: Cart,
    catalog: Catalog,
    period: Duration,
) -> anyhow::Result<RotationReport> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("could not start the rotation runtime")?;

    let report = runtime.block_on(async {
        let sink = Arc::new(InMemoryCartSink::default());
        let mut session = UpsellSession::new(store, catalog, sink, period);
        session.update_cart(cart);

        let mut frames = vec![frame(0, &session)];
        // Sample halfway between ticks so the observation never races the timer.
        tokio::time::sleep(period / 2).await;
        for tick in 1..=args.ticks {
            tokio::time::sleep(period).await;
            frames.push(frame(tick, &session));
        }

        let accepted = if args.accept { session.accept() } else { None };
        session.shutdown();
        RotationReport { period_secs: period.as_secs(), frames, accepted }
    });
    Ok(report)
}

fn frame(tick: usize, session: &UpsellSession) -> Frame {
    let current = session.current();
    Frame {
        tick,
        state: session.state(),
        product_id: current.as_ref().map(|suggestion| suggestion.product.id.as_str().to_owned()),
        message: current.map(|suggestion| suggestion.message),
    }
}
