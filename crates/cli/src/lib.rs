pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use upsell_core::config::{AppConfig, LoadOptions};

use crate::commands::rotate::RotateArgs;
use crate::commands::settings::SetArgs;
use crate::commands::suggest::SuggestArgs;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "upsell",
    about = "Upsell suggestion engine operator CLI",
    long_about = "Rank upsell suggestions for cart snapshots, simulate their rotation, and manage persisted engine settings.",
    after_help = "Examples:\n  upsell suggest --cart cart.json --catalog catalog.json\n  upsell rotate --cart cart.json --catalog catalog.json --ticks 3\n  upsell settings set --disable urgency\n  upsell config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an upsell.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Rank suggestions for a cart snapshot against a catalog snapshot")]
    Suggest {
        #[arg(long, help = "Cart snapshot (JSON array of cart lines)")]
        cart: PathBuf,
        #[arg(long, help = "Catalog snapshot (JSON array of products)")]
        catalog: PathBuf,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show which suggestion is displayed on each rotation tick")]
    Rotate {
        #[arg(long)]
        cart: PathBuf,
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long, default_value_t = 3, help = "Number of rotation ticks to simulate")]
        ticks: usize,
        #[arg(long, help = "Accept the suggestion showing after the last tick")]
        accept: bool,
        #[arg(long, help = "Wait for the real rotation timer instead of ticking by hand")]
        live: bool,
    },
    #[command(about = "Inspect or edit persisted engine settings")]
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    #[command(about = "Print the persisted engine settings")]
    Show,
    #[command(about = "Update and persist engine settings")]
    Set {
        #[arg(long, help = "Full settings JSON payload; other flags apply on top")]
        payload: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        max_suggestions: Option<usize>,
        #[arg(long = "enable", value_name = "TRIGGER")]
        enable_triggers: Vec<String>,
        #[arg(long = "disable", value_name = "TRIGGER")]
        disable_triggers: Vec<String>,
        #[arg(long, value_name = "AMOUNT")]
        low_value_threshold: Option<String>,
        #[arg(long)]
        confidence_threshold: Option<f64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if matches!(cli.command, Command::Config) {
        return emit(commands::config::run(cli.config.as_deref()));
    }

    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config.clone(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return emit(CommandResult::from_config_error("startup", &error)),
    };
    logging::init(&config);

    let result = match cli.command {
        Command::Suggest { cart, catalog, json } => {
            commands::suggest::run(&SuggestArgs { cart, catalog, json }, &config)
        }
        Command::Rotate { cart, catalog, ticks, accept, live } => {
            commands::rotate::run(&RotateArgs { cart, catalog, ticks, accept, live }, &config)
        }
        Command::Settings { action: SettingsAction::Show } => commands::settings::show(&config),
        Command::Settings {
            action:
                SettingsAction::Set {
                    payload,
                    enabled,
                    max_suggestions,
                    enable_triggers,
                    disable_triggers,
                    low_value_threshold,
                    confidence_threshold,
                },
        } => commands::settings::set(
            &SetArgs {
                payload,
                enabled,
                max_suggestions,
                enable_triggers,
                disable_triggers,
                low_value_threshold,
                confidence_threshold,
            },
            &config,
        ),
        Command::Config => commands::config::run(cli.config.as_deref()),
    };

    emit(result)
}

fn emit(result: CommandResult) -> ExitCode {
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
