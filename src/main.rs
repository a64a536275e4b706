//! Cell Field CLI - Run the field from a JSON configuration.
//!
//! Observations are read from stdin, one JSON `ObservationEvent` per line.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use cell_field::{
    audit::{AuditPlayer, AuditRecorder, RecorderConfig},
    compute::{AdaptationEmitter, PopulationManager},
    runtime::{FeedHandle, FieldRuntime, LogSink, observation_channel},
    schema::{FieldConfig, ObservationEvent},
};

#[tokio::main]
async fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [ticks]", args[0]);
        eprintln!();
        eprintln!("Run the cell field, reading observation events from stdin.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to field configuration file");
        eprintln!("  ticks        Number of ticks to run (default: 10)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let ticks: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: FieldConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let mut manager = PopulationManager::new(config.clone()).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });
    let emitter = AdaptationEmitter::new(config.adaptation.clone());

    // Replay and open the audit store
    let audit = config.audit.path.as_ref().and_then(|path| {
        let path = Path::new(path);
        if config.audit.replay_entries > 0 && path.exists() {
            match AuditPlayer::open_tail(path, config.audit.replay_entries) {
                Ok(entries) => {
                    let summary = manager.replay(&entries);
                    println!(
                        "Replayed {} entries: {} lineage records, {} cells",
                        entries.len(),
                        summary.lineage_restored,
                        summary.cells_seeded
                    );
                }
                Err(e) => warn!("Skipping audit replay: {}", e),
            }
        }
        match AuditRecorder::open(path, RecorderConfig::from(&config.audit)) {
            Ok(recorder) => Some(recorder),
            Err(e) => {
                warn!("Audit store unavailable, continuing without it: {}", e);
                None
            }
        }
    });

    println!("Cell Field");
    println!("==========");
    println!(
        "Population: {} initial, {} max",
        config.population.initial_size, config.population.max_size
    );
    println!(
        "Thresholds: death < {}, birth > {}",
        config.selection.death_threshold, config.selection.birth_threshold
    );
    println!("Rules: {}", config.adaptation.rules.len());
    println!("Period: {} ms", config.schedule.period_ms);
    println!("Ticks: {}", ticks);
    println!();

    let (feed_handle, feed) = observation_channel(config.schedule.feed_capacity);
    tokio::spawn(read_observations(feed_handle.clone()));

    let start = Instant::now();
    let mut runtime = FieldRuntime::spawn(
        manager,
        emitter,
        Box::new(feed),
        Arc::new(LogSink),
        audit,
    );

    let mut generation = runtime.subscribe();
    let mut last_reported = 0;
    loop {
        tokio::select! {
            changed = generation.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *generation.borrow_and_update();
                if current > last_reported {
                    last_reported = current;
                    println!("  {}", runtime.status());
                }
                if current >= ticks {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    let report = runtime.shutdown().await.unwrap_or_else(|e| {
        eprintln!("Error during shutdown: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Final state:");
    println!("  {}", report.status);
    println!(
        "  Signals: {} emitted, {} applied, {} failed, {} dropped",
        report.signals_emitted,
        report.signals_applied,
        report.signals_failed,
        report.signals_dropped
    );
    println!("  Observations dropped: {}", feed_handle.dropped());
    if let Some(audit) = &report.audit {
        println!("  Audit: {}", audit);
    }
    println!(
        "Time: {:.2}s ({} ticks)",
        start.elapsed().as_secs_f32(),
        report.ticks
    );
}

/// Forward stdin lines into the feed until EOF.
async fn read_observations(handle: FeedHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ObservationEvent>(&line) {
                    Ok(event) => {
                        handle.push(event);
                    }
                    Err(e) => warn!("Ignoring malformed observation: {}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading observations: {}", e);
                break;
            }
        }
    }
    handle.close();
}

fn print_example_config() {
    let config = FieldConfig {
        random_seed: Some(42),
        ..FieldConfig::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}
