use clap::Args;

use adhan_core::{ReprogramRun, RunTrigger};
use chrono::{DateTime, Utc};

use super::common::{open_context, parse_now, require_settings, runtime, CliResult};

#[derive(Args)]
pub struct ReprogramArgs {
    /// Reference instant (RFC 3339)
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReprogramArgs) -> CliResult {
    let ctx = open_context(args.now)?;
    let settings = require_settings(&ctx)?;
    let run = runtime()?.block_on(
        ctx.coordinator()
            .reprogram_all(settings, RunTrigger::Manual),
    );
    print_run(&run, args.json)?;
    if run.success {
        Ok(())
    } else {
        Err(format!("reprogram failed: {}", run.reason().unwrap_or("unknown")).into())
    }
}

pub fn print_run(run: &ReprogramRun, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(run)?);
        return Ok(());
    }
    println!("run:        {}", run.id);
    println!("trigger:    {}", run.trigger);
    println!("success:    {}", run.success);
    println!("intents:    {}", run.intent_count);
    println!("installed:  {}", run.installed_count);
    if run.truncated {
        println!("truncated:  true");
    }
    if let Some(error) = &run.error {
        println!("error:      {error}");
    }
    Ok(())
}
