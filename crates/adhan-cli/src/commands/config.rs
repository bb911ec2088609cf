//! Engine tuning stored in `config.toml`.

use clap::Subcommand;
use serde_json::Value;

use adhan_core::Config;

use super::common::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value (e.g. "reprogram.debounce_ms")
    Get { key: String },
    /// Change one value and save
    Set {
        key: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Print every value as `section.field = value`
    List {
        /// Print the whole file as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Print the location of config.toml
    Path,
    /// Restore defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let before = config.get(&key);
            config.set(&key, &value)?;
            config.save()?;
            tracing::debug!(%key, ?before, "config updated");
            // Echo the parsed value so type coercions are visible.
            println!("{key} = {}", config.get(&key).unwrap_or(value));
        }
        ConfigAction::List { json } => {
            let tree = serde_json::to_value(Config::load()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                let mut lines = Vec::new();
                flatten("", &tree, &mut lines);
                for (key, value) in lines {
                    println!("{key} = {value}");
                }
            }
        }
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

/// Leaf values keyed by their dot path, sorted by key.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(fields) => {
            for (name, child) in fields {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                flatten(&key, child, out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_uses_dot_paths() {
        let tree = serde_json::json!({
            "reprogram": { "debounce_ms": 750, "retry_max_attempts": 3 },
            "cache": { "capacity": 64 },
        });
        let mut lines = Vec::new();
        flatten("", &tree, &mut lines);
        assert!(lines.contains(&("reprogram.debounce_ms".to_string(), "750".to_string())));
        assert!(lines.contains(&("cache.capacity".to_string(), "64".to_string())));
        assert_eq!(lines.len(), 3);
    }
}
