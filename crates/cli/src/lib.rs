pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "carfleet",
    about = "Carfleet operator CLI",
    long_about = "Prepare the fleet database, inspect effective configuration, and check runtime readiness.",
    after_help = "Examples:\n  carfleet migrate\n  carfleet seed\n  carfleet doctor --json\n  carfleet config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo fleet (idempotent) and verify every seeded car is present")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model provider readiness, and database state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
