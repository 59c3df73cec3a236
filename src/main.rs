use anyhow::Result;
use chemotaxis_common::{ScenarioConfig, Snapshot};
use chemotaxis_engine::Simulation;
use clap::Parser;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Runs a chemotaxis scenario described in a TOML file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scenario configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides the snapshot format: json, bincode or messagepack.
    #[arg(long)]
    output_format: Option<String>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting chemotaxis engine...");

    // --- Load Configuration ---
    let mut config = ScenarioConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(format) = args.output_format {
        config.output.format = Some(format);
    }

    let mut sim = Simulation::new(config)?;
    debug!("Timing: {:#?}", sim.config.timing);

    let end_time = sim.config.timing.end_time;
    let max_events = sim.config.timing.max_events;
    info!("Running until t={} or {} events...", end_time, max_events);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;

    while sim.events_executed() + sim.failed_events() < max_events {
        if !sim.step()? {
            break;
        }
        let now = Instant::now();
        if now.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs {
            info!(
                "t={:.3}/{} | events: {} ({} failed) | elapsed: {:.2} s",
                sim.current_time(),
                end_time,
                sim.events_executed(),
                sim.failed_events(),
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = now;
        } else {
            trace!("t={:.4} | events: {}", sim.current_time(), sim.events_executed());
        }
    }
    sim.finish();

    info!(
        "Simulation finished at t={:.3} after {} events in {:.3} seconds.",
        sim.current_time(),
        sim.events_executed(),
        start_time.elapsed().as_secs_f64()
    );

    // --- Save Recorded Data ---
    if sim.config.output.save_stats {
        let output_format = sim.config.output.format.as_deref().unwrap_or("json");
        let base = &sim.config.output.base_filename;
        if let Err(e) = write_snapshots(base, output_format, sim.get_recorded_snapshots()) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if sim.config.output.save_positions {
        let filename = format!("{}_final_positions.csv", sim.config.output.base_filename);
        let mut writer = csv::Writer::from_path(&filename)?;
        writer.write_record(["x", "y"])?;
        for (x, y) in sim.get_results() {
            writer.write_record(&[format!("{:.6}", x), format!("{:.6}", y)])?;
        }
        writer.flush()?;
        info!("Final cell positions saved to {}", filename);
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn write_snapshots(base: &str, format: &str, snapshots: &[Snapshot]) -> Result<()> {
    match format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base);
            bincode::serialize_into(File::create(&filename)?, snapshots)?;
            info!("{} snapshots saved to {} (binary format)", snapshots.len(), filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base);
            rmp_serde::encode::write(&mut File::create(&filename)?, snapshots)?;
            info!("{} snapshots saved to {} (MessagePack format)", snapshots.len(), filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base);
            let json_string = serde_json::to_string(snapshots)?;
            File::create(&filename)?.write_all(json_string.as_bytes())?;
            info!("{} snapshots saved to {}", snapshots.len(), filename);
        }
    }
    Ok(())
}
