use clap::Args;

use adhan_core::Clock;
use chrono::{DateTime, Utc};

use super::common::{open_context, parse_now, require_settings, CliResult};

#[derive(Args)]
pub struct ScheduleArgs {
    /// Horizon in days; defaults to the tier's configured horizon
    #[arg(long)]
    days: Option<u32>,
    /// Reference instant (RFC 3339)
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ScheduleArgs) -> CliResult {
    let ctx = open_context(args.now)?;
    let settings = require_settings(&ctx)?;
    let horizon = args.days.unwrap_or_else(|| ctx.horizon_days(&settings));
    let out = ctx
        .computer()
        .compute(&settings, horizon, ctx.clock().now())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let offset = settings.utc_offset()?;
    for intent in &out.intents {
        println!(
            "{}  {:<18} {:<8} {}",
            intent.fires_at.with_timezone(&offset).format("%Y-%m-%d %H:%M"),
            intent.kind.as_str(),
            intent.payload.prayer.as_str(),
            intent.id,
        );
    }
    if out.truncated {
        println!(
            "(showing {} of {} alerts; boundary limit reached)",
            out.intents.len(),
            out.raw_count
        );
    } else if out.intents.is_empty() {
        println!("no alerts scheduled");
    }
    Ok(())
}
