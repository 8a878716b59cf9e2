pub mod commands;
pub mod logging;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use storefront_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront support and checkout operator CLI",
    long_about = "Inspect configuration, check runtime readiness, apply migrations and run an offline smoke test of the support and checkout pipelines.",
    after_help = "Examples:\n  storefront doctor --json\n  storefront config\n  storefront smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Run an in-memory support exchange, shipping calculation and discount selection"
    )]
    Smoke,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, AI and freight readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = logging::init_logging(&config.logging) {
            eprintln!("{error:#}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
