use clap::Subcommand;

use adhan_core::{CalculationMethod, Coordinates, RunTrigger, Settings};

use super::common::{open_context, runtime, CliResult};
use super::reprogram::print_run;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the stored settings, or one field
    Show {
        /// Dot-separated field (e.g. "dhikr.morning_enabled")
        key: Option<String>,
    },
    /// Change one field and reprogram if the schedule is affected
    Set {
        /// Dot-separated field (e.g. "coordinates.latitude")
        key: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// Only store the change
        #[arg(long)]
        no_reprogram: bool,
    },
    /// Delete the stored settings
    Reset,
}

pub fn run(action: SettingsAction) -> CliResult {
    let ctx = open_context(None)?;
    let store = ctx.settings_store();
    match action {
        SettingsAction::Show { key } => {
            let Some(settings) = store.load()? else {
                println!("no settings stored");
                return Ok(());
            };
            match key {
                Some(key) => match settings.get(&key) {
                    Some(value) => println!("{value}"),
                    None => return Err(format!("unknown key: {key}").into()),
                },
                None => println!("{}", serde_json::to_string_pretty(&settings)?),
            }
        }
        SettingsAction::Set {
            key,
            value,
            no_reprogram,
        } => {
            let current = match store.load()? {
                Some(settings) => settings,
                None => Settings::new(
                    Coordinates::new(0.0, 0.0)?,
                    CalculationMethod::MuslimWorldLeague,
                ),
            };
            let updated = current.with_field(&key, &value)?;
            store.save(&updated)?;
            println!("ok");

            if !no_reprogram && current.affects_schedule(&updated) {
                let run = runtime()?.block_on(
                    ctx.coordinator()
                        .reprogram_all(updated, RunTrigger::Settings),
                );
                print_run(&run, false)?;
            }
        }
        SettingsAction::Reset => {
            store.clear()?;
            println!("settings cleared");
        }
    }
    Ok(())
}
