//! Read-only view of the reprogram run history.

use clap::Args;

use adhan_core::DiagnosticsSink;

use super::common::{open_context, CliResult};

#[derive(Args)]
pub struct DiagnosticsArgs {
    /// Maximum number of runs to show, newest first
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: DiagnosticsArgs) -> CliResult {
    let ctx = open_context(None)?;
    let runs = ctx.diagnostics().list(args.limit);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("no runs recorded");
        return Ok(());
    }
    if let Ok(Some(at)) = ctx.coordinator().last_reprogrammed_at() {
        println!("last successful reprogram: {}", at.to_rfc3339());
    }
    for run in runs {
        println!(
            "{}  {:<10} {:<5} {:>3}/{:<3} {}",
            run.ran_at.format("%Y-%m-%d %H:%M:%S"),
            run.trigger.as_str(),
            if run.success { "ok" } else { "FAIL" },
            run.installed_count,
            run.intent_count,
            run.reason().unwrap_or(""),
        );
    }
    Ok(())
}
