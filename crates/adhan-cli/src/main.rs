use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adhan-cli", version, about = "Adhan prayer alert CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prayer times for the configured location
    Times(commands::times::TimesArgs),
    /// Show the alerts that would be installed
    Schedule(commands::schedule::ScheduleArgs),
    /// Cancel and reinstall all alarms now
    Reprogram(commands::reprogram::ReprogramArgs),
    /// Background refresh entry point for the host scheduler
    Refresh(commands::refresh::RefreshArgs),
    /// Recent reprogram runs
    Diagnostics(commands::diagnostics::DiagnosticsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// User settings snapshot
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("adhan_core=info,adhan_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Times(args) => commands::times::run(args),
        Commands::Schedule(args) => commands::schedule::run(args),
        Commands::Reprogram(args) => commands::reprogram::run(args),
        Commands::Refresh(args) => commands::refresh::run(args),
        Commands::Diagnostics(args) => commands::diagnostics::run(args),
        Commands::Config { action } => commands::config::run(action),
        Commands::Settings { action } => commands::settings::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
