//! Pipeline Runtime - simulated sensor → edge → aggregator → cloud
//!
//! This binary wires the whole pipeline in one process:
//! - Connects the edge and cloud brokers
//! - Spawns the simulated sensor, ingestion, flush scheduler and cloud consumer
//! - Optionally shows the live chart (ENABLE_UI=true)
//! - Stops on CTRL+C, on the UI's `q`, or when PLOT_INTERVAL_SECS elapses
//! - Exports the collected series (SERIES_EXPORT_PATH)
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime
//!
//! Environment variables:
//!   EDGE_BROKER_ADDRESS / CLOUD_BROKER_ADDRESS - broker addresses (required)
//!   EDGE_TOPIC / CLOUD_TOPIC - topics (default: sensor/data, sensor/average)
//!   SAMPLING_INTERVAL_SECS - flush interval (default: 5)
//!   PLOT_INTERVAL_SECS - run budget, "none" to run until CTRL+C (default: 10)
//!   USE_MOVING_AVERAGE / WINDOW_SIZE - aggregation mode (default: false / 5)
//!   LOG_FILE - log destination while ENABLE_UI=true (default: pipeline_runtime.log)

use dotenv::dotenv;
use log::{error, info, warn};
use sensorflow::export::save_series_snapshot;
use sensorflow::pipeline::{
    config::PipelineConfig,
    engine::{lock_engine, PipelineEngine},
    ingestion::start_pipeline_ingestion,
    scheduler::flush_scheduler_task,
};
use sensorflow::producer::{cloud_consumer_task, publish_samples};
use sensorflow::simulator::{ArrivalClock, Simulator};
use sensorflow::transport::{BrokerRegistry, Publisher};
use sensorflow::ui::{log_target, run_ui};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = PipelineConfig::from_env()?;

    let log_path = std::env::var("LOG_FILE").unwrap_or_else(|_| "pipeline_runtime.log".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(log_target(config.enable_ui, Path::new(&log_path))?)
        .init();

    let mode = config.aggregation_mode();
    let sampling_interval = config.sampling_interval()?;
    let run_budget = config.run_budget()?;
    info!("🚀 SensorFlow pipeline runtime");
    info!("📊 Configuration:");
    info!("   ├─ Edge: {} (topic: {})", config.edge_broker_address, config.edge_topic);
    info!("   ├─ Cloud: {} (topic: {})", config.cloud_broker_address, config.cloud_topic);
    info!("   ├─ Mode: {:?}", mode);
    info!("   ├─ Sampling interval: {}s", config.sampling_interval_secs);
    match config.plot_interval_secs {
        Some(budget) => info!("   └─ Run budget: {}s", budget),
        None => info!("   └─ Run budget: unbounded (CTRL+C to stop)"),
    }

    // Connect brokers
    let registry = BrokerRegistry::new(config.channel_buffer);
    let edge = registry.connect(&config.edge_broker_address)?;
    let cloud = registry.connect(&config.cloud_broker_address)?;

    // Subscribe before anything publishes
    let edge_subscription = edge.subscribe(&config.edge_topic)?;
    let cloud_subscription = cloud.subscribe(&config.cloud_topic)?;

    let engine = Arc::new(Mutex::new(PipelineEngine::new(mode)));
    let (stop_tx, stop_rx) = watch::channel(false);

    // Task 1: ingestion (edge subscription → engine)
    let ingestion = tokio::spawn(start_pipeline_ingestion(
        edge_subscription,
        engine.clone(),
        stop_rx.clone(),
    ));

    // Task 2: flush scheduler (engine → cloud)
    let cloud_publisher: Arc<dyn Publisher> = cloud.clone();
    let scheduler = tokio::spawn(flush_scheduler_task(
        engine.clone(),
        cloud_publisher,
        config.cloud_topic.clone(),
        sampling_interval,
        run_budget,
        stop_rx.clone(),
    ));

    // Task 3: cloud consumer
    let consumer = tokio::spawn(cloud_consumer_task(cloud_subscription, stop_rx.clone()));

    // Task 4: simulated sensor
    let edge_publisher: Arc<dyn Publisher> = edge.clone();
    let producer = tokio::spawn(publish_samples(
        Simulator::new(config.simulator_seed, config.simulator_mean, config.simulator_std_dev),
        ArrivalClock::new(config.simulator_seed),
        edge_publisher,
        config.edge_topic.clone(),
        config.arrival_rate,
        config.max_messages,
        stop_rx.clone(),
    ));

    // Task 5: live chart
    let ui = if config.enable_ui {
        let engine_ui = engine.clone();
        let stop_ui = stop_tx.clone();
        let trailing = config.trailing_window_secs;
        Some(tokio::spawn(async move {
            if let Err(e) = run_ui(engine_ui, trailing, stop_ui).await {
                error!("UI error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("✅ All tasks running, press CTRL+C to stop");

    // The scheduler ends on its own when the run budget elapses
    let mut scheduler = scheduler;
    let mut stop_rx_main = stop_rx;
    let summary = tokio::select! {
        result = &mut scheduler => result.ok(),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
            }
            None
        }
        _ = stop_rx_main.changed() => {
            info!("⚠️  Stop requested, shutting down...");
            None
        }
    };

    // Stop everything, let in-flight work finish, then close the brokers
    let _ = stop_tx.send(true);
    let summary = match summary {
        Some(summary) => Some(summary),
        None => scheduler.await.ok(),
    };
    let published = producer.await.unwrap_or(0);
    let stats = ingestion.await.unwrap_or_default();

    edge.disconnect();
    cloud.disconnect();
    let consumed = consumer.await.unwrap_or(0);
    if let Some(ui) = ui {
        let _ = ui.await;
    }

    // Both tasks have stopped; the series can no longer change
    let (snapshot, label) = {
        let engine_guard = lock_engine(&engine);
        (engine_guard.snapshot(), engine_guard.mode().label())
    };

    info!("📊 Run summary:");
    info!("   ├─ Readings published: {}", published);
    info!("   ├─ Samples accepted: {} (dropped: {})", stats.accepted, stats.parse_failures);
    if let Some(summary) = summary {
        info!(
            "   ├─ Flushes: {} ({} published, {} empty, {} failed)",
            summary.ticks, summary.published, summary.empty, summary.publish_failures
        );
    }
    info!("   ├─ Cloud aggregates received: {}", consumed);
    info!(
        "   └─ Series: {} raw, {} {}",
        snapshot.raw.len(),
        snapshot.aggregates.len(),
        label
    );

    match &config.series_export_path {
        Some(path) => {
            if let Err(e) = save_series_snapshot(path, label, &snapshot) {
                error!("❌ Failed to export series: {}", e);
            }
        }
        None => warn!("SERIES_EXPORT_PATH not set, collected series not exported"),
    }

    info!("✅ Pipeline runtime stopped");
    Ok(())
}
