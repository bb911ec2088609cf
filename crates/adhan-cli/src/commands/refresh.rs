use clap::Args;
use serde_json::json;

use chrono::{DateTime, Utc};

use super::common::{open_context, parse_now, runtime, CliResult};

#[derive(Args)]
pub struct RefreshArgs {
    /// Reference instant (RFC 3339)
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Runs the background job once. A failed refresh is reported, not treated
/// as a CLI error: the host scheduler only needs the fetch result.
pub fn run(args: RefreshArgs) -> CliResult {
    let ctx = open_context(args.now)?;
    let job = ctx.background();
    let result = runtime()?.block_on(job.run());
    let next = job.earliest_next_begin();
    tracing::debug!(result = result.as_str(), %next, "refresh done");

    if args.json {
        let out = json!({ "result": result, "earliest_next_begin": next });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", result.as_str());
        println!("next refresh not before {}", next.to_rfc3339());
    }
    Ok(())
}
