//! `compensa validate` and `compensa municipalities` — rule table inspection.

use std::path::{Path, PathBuf};

use compensa_engine::load::TableReport;
use compensa_engine::{load_store, CompensationConfig, LoadReport, MemoryRuleStore, Mode, RuleStore};

use crate::exit_codes::EXIT_RUNTIME;
use crate::CliError;

/// Read and validate the config, then load every rule table it names.
/// Rule files resolve relative to the config file's directory.
pub fn load_rules(
    config_path: &Path,
) -> Result<(CompensationConfig, MemoryRuleStore, LoadReport), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_RUNTIME, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    let config = CompensationConfig::from_toml(&config_str)?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let (store, report) = load_store(&config, base_dir)?;
    Ok((config, store, report))
}

pub fn cmd_validate(config_path: PathBuf, json: bool) -> Result<(), CliError> {
    let (config, _, report) = load_rules(&config_path)?;

    if json {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("{}: ok (ungrouped policy: {})", config.name, config.matching.ungrouped);
    for (label, table) in [("trees", &report.trees), ("patches", &report.patches)] {
        if let Some(table) = table {
            print_table(label, table);
        }
    }
    Ok(())
}

fn print_table(label: &str, table: &TableReport) {
    println!(
        "  {label}: {} rule(s) from {}, {} row(s) skipped",
        table.loaded,
        table.file,
        table.skipped.len()
    );
    for row in &table.skipped {
        println!("    line {}: {}", row.line, row.reason);
    }
}

pub fn cmd_municipalities(config_path: PathBuf, mode: Mode, json: bool) -> Result<(), CliError> {
    let (_, store, _) = load_rules(&config_path)?;
    let names = store.municipalities(mode);

    if json {
        let value = serde_json::json!({ "mode": mode, "municipalities": names });
        println!("{value}");
    } else {
        for name in &names {
            println!("{name}");
        }
    }
    Ok(())
}
