//! Simulator - dump a synthetic sensor series as JSON lines
//!
//! Each line: {"index", "value", "interval_secs", "elapsed_secs"}
//!
//! Usage:
//!   cargo run --bin simulator -- [COUNT]
//!
//! Environment variables:
//!   SIMULATOR_SEED (12345), SIMULATOR_MEAN (20), SIMULATOR_STD_DEV (5), ARRIVAL_RATE (10)

use dotenv::dotenv;
use sensorflow::simulator::{ArrivalClock, Simulator};
use serde::Serialize;
use std::env;
use std::io::{BufWriter, Write};

#[derive(Serialize)]
struct GeneratedReading {
    index: u64,
    value: f64,
    interval_secs: f64,
    elapsed_secs: f64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("Invalid value for {}: {:?}", name, raw).into()),
        Err(_) => Ok(default),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let count: u64 = match env::args().nth(1) {
        Some(arg) => arg.parse().map_err(|_| format!("COUNT must be an integer, got {:?}", arg))?,
        None => 100,
    };
    let seed: u64 = env_or("SIMULATOR_SEED", 12345)?;
    let mean: f64 = env_or("SIMULATOR_MEAN", 20.0)?;
    let std_dev: f64 = env_or("SIMULATOR_STD_DEV", 5.0)?;
    let rate: f64 = env_or("ARRIVAL_RATE", 10.0)?;

    log::info!("Generating {} readings (seed {}, mean {}, std dev {}, rate {}/s)", count, seed, mean, std_dev, rate);

    let mut simulator = Simulator::new(seed, mean, std_dev);
    let mut clock = ArrivalClock::new(seed);
    let mut out = BufWriter::new(std::io::stdout().lock());
    let mut elapsed_secs = 0.0;

    for index in 0..count {
        let interval_secs = clock.next_time_interval(rate);
        elapsed_secs += interval_secs;

        let reading = GeneratedReading {
            index,
            value: simulator.calculate_next_value(),
            interval_secs,
            elapsed_secs,
        };
        writeln!(out, "{}", serde_json::to_string(&reading)?)?;
    }

    out.flush()?;
    Ok(())
}
