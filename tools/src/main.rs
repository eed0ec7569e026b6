//! ledger-runner: headless runner for the bundle storefront ledger.
//!
//! Usage:
//!   ledger-runner --db store.db --data-dir ./data
//!   ledger-runner --db store.db --import legacy.json
//!   ledger-runner --db store.db --export snapshot.json
//!
//! Without `--export`, reads one JSON command per line from stdin and
//! writes one JSON reply per line to stdout:
//!   {"cmd":"login","email":"user@falcon.com","password":"password"}
//!   -> {"ok": {...}}  or  {"error": "..."}

use anyhow::Result;
use bundle_ledger_core::{command::LedgerCommand, Storefront};
use serde::Deserialize;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Control {
    Quit,
    Events {
        #[serde(default = "default_event_limit")]
        limit: usize,
    },
}

fn default_event_limit() -> usize {
    20
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RunnerInput {
    Control(Control),
    Ledger(LedgerCommand),
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = parse_arg(&args, "--db", "ledger.db".to_string());
    let data_dir = parse_arg(&args, "--data-dir", "./data".to_string());
    let import = find_arg(&args, "--import");
    let export = find_arg(&args, "--export");

    log::info!("ledger-runner: db={db} data_dir={data_dir}");

    let front = match &import {
        Some(path) => {
            let front = Storefront::open(&db, &data_dir)?;
            let json = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
            let summary = front.import_snapshot(&json)?;
            log::info!(
                "ledger-runner: imported v{} snapshot ({} users, {} transactions)",
                summary.source_version,
                summary.users,
                summary.transactions
            );
            front.seed()?;
            front
        }
        None => Storefront::build(&db, &data_dir)?,
    };

    if let Some(path) = export {
        let snapshot = front.export_snapshot()?;
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        println!("exported {} users, {} transactions to {path}", snapshot.users.len(), snapshot.transactions.len());
        return Ok(());
    }

    run_command_loop(&front)
}

fn run_command_loop(front: &Storefront) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let input: RunnerInput = match serde_json::from_str(&buffer) {
            Ok(i) => i,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match input {
            RunnerInput::Control(Control::Quit) => break,
            RunnerInput::Control(Control::Events { limit }) => match front.recent_events(limit) {
                Ok(events) => {
                    let decoded: Vec<_> = events.iter().filter_map(|e| e.decode().ok()).collect();
                    serde_json::json!({ "ok": decoded })
                }
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
            RunnerInput::Ledger(cmd) => match front.execute(cmd) {
                Ok(value) => serde_json::json!({ "ok": value }),
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn find_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
