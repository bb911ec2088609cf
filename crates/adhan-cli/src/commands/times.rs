use clap::Args;
use serde::Serialize;

use adhan_core::{CalculationMethod, Clock, Coordinates, Prayer};
use chrono::{Duration, NaiveDate};

use super::common::{open_context, parse_now, require_settings, CliResult};

#[derive(Args)]
pub struct TimesArgs {
    /// Number of days to show
    #[arg(long, default_value_t = 1)]
    days: u32,
    /// First day (YYYY-MM-DD); defaults to today in the configured offset
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Override the configured latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Override the configured longitude
    #[arg(long, allow_hyphen_values = true)]
    lng: Option<f64>,
    /// Override the calculation method (e.g. "umm_al_qura")
    #[arg(long)]
    method: Option<CalculationMethod>,
    /// Reference instant (RFC 3339) used to pick "today"
    #[arg(long, value_parser = parse_now)]
    now: Option<chrono::DateTime<chrono::Utc>>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct DayRow {
    date: NaiveDate,
    times: Vec<(Prayer, String)>,
}

pub fn run(args: TimesArgs) -> CliResult {
    let ctx = open_context(args.now)?;
    let mut settings = require_settings(&ctx)?;
    if args.lat.is_some() || args.lng.is_some() {
        settings.coordinates = Coordinates::new(
            args.lat.unwrap_or(settings.coordinates.latitude),
            args.lng.unwrap_or(settings.coordinates.longitude),
        )?;
    }
    if let Some(method) = args.method {
        settings.method = method;
    }

    let offset = settings.utc_offset()?;
    let first = match args.date {
        Some(date) => date,
        None => settings.local_date(ctx.clock().now())?,
    };

    let mut rows = Vec::new();
    for n in 0..args.days {
        let date = first + Duration::days(i64::from(n));
        let prayers = ctx.cache().get(
            date,
            &settings.coordinates,
            settings.method,
            settings.madhab,
        )?;
        let times = prayers
            .iter()
            .map(|(prayer, at)| (prayer, at.with_timezone(&offset).format("%H:%M").to_string()))
            .collect();
        rows.push(DayRow { date, times });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let header: Vec<_> = Prayer::ALL.iter().map(|p| format!("{:>8}", p.as_str())).collect();
    println!("{:<10} {}", "date", header.join(""));
    for row in rows {
        let cells: Vec<_> = row.times.iter().map(|(_, t)| format!("{t:>8}")).collect();
        println!("{:<10} {}", row.date, cells.join(""));
    }
    Ok(())
}
