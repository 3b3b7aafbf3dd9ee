//! `compensa run` — compute compensation for a batch file.

use std::io::Read;
use std::path::{Path, PathBuf};

use compensa_engine::{BatchResult, BatchRunner, UngroupedPolicy};
use serde::Serialize;
use serde_json::Value;

use crate::exit_codes::{EXIT_INVALID_BATCH, EXIT_RUNTIME, EXIT_UNMATCHED};
use crate::rules::load_rules;
use crate::CliError;

#[derive(Debug, Serialize)]
struct RunMeta {
    config_name: String,
    policy: UngroupedPolicy,
    engine_version: &'static str,
    run_at: String,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    meta: RunMeta,
    #[serde(flatten)]
    result: &'a BatchResult,
}

fn read_batch(path: &Path) -> Result<Value, CliError> {
    let data = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            CliError::new(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display()))
        })?
    };

    serde_json::from_str(&data).map_err(|e| {
        CliError::new(EXIT_INVALID_BATCH, format!("batch is not valid JSON: {e}"))
            .with_hint("send {\"items\": [...]} with at least one item")
    })
}

pub fn cmd_run(
    config_path: PathBuf,
    batch_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    policy: Option<UngroupedPolicy>,
) -> Result<(), CliError> {
    let (config, store, _) = load_rules(&config_path)?;
    let payload = read_batch(&batch_path)?;

    let policy = policy.unwrap_or(config.matching.ungrouped);
    let runner = BatchRunner::new(&store, policy);
    let result = runner.run_request(&payload)?;

    let report = RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            policy,
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        result: &result,
    };
    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str).map_err(|e| {
            CliError::new(EXIT_RUNTIME, format!("cannot write {}: {e}", path.display()))
        })?;
        log::info!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{} item(s): {} processed, {} unmatched, total {}",
        s.items, s.processed, s.unmatched, result.total
    );
    for u in &result.unmatched {
        eprintln!("  #{}: {}", u.index, u.reason);
    }

    if s.unmatched > 0 {
        return Err(CliError::new(
            EXIT_UNMATCHED,
            format!("{} item(s) without compensation", s.unmatched),
        ));
    }
    Ok(())
}
