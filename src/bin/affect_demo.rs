//! Affect-Core demo
//!
//! Streams synthetic EEG into the pipeline in bursts, runs the periodic
//! scheduler, prints every published label and simulates a headband
//! disconnect half way through. An optional argument names a JSON model for
//! `LinearSoftmaxClassifier`; configuration comes from `affect.toml` and
//! `AFFECT_*` environment variables.

use affect_core::config::{constants::features::STATISTICAL_FEATURE_COUNT, ConfigLoader, PipelineConfig};
use affect_core::inference::{EmotionLabel, LinearSoftmaxClassifier, TickEventKind};
use affect_core::simulation::{SyntheticConfig, SyntheticEeg};
use affect_core::AffectPipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const RUN_FOR: Duration = Duration::from_secs(45);
const DISCONNECT_AT: Duration = Duration::from_secs(20);
const DISCONNECT_FOR: Duration = Duration::from_secs(12);
const BURST_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = ConfigLoader::new().load()?;
    let classifier = match std::env::args().nth(1) {
        Some(path) => LinearSoftmaxClassifier::from_json_file(path)?,
        None => demo_model(&config),
    };

    let pipeline = Arc::new(
        AffectPipeline::builder(config.clone())
            .classifier(Arc::new(classifier))
            .build()?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = pipeline.spawn_scheduler(shutdown_rx);

    let running = Arc::new(AtomicBool::new(true));
    let producer = spawn_producer(Arc::clone(&pipeline), Arc::clone(&running), &config);
    let printer = spawn_printer(Arc::clone(&pipeline), Arc::clone(&running));

    tokio::time::sleep(RUN_FOR).await;

    running.store(false, Ordering::Relaxed);
    shutdown_tx.send(true)?;
    scheduler.await?;
    printer.await?;
    if producer.join().is_err() {
        tracing::error!("producer thread panicked");
    }

    let buffer = pipeline.buffer_metrics();
    let scheduler = pipeline.scheduler_metrics();
    println!(
        "accepted {} samples ({} rejected, {} evicted); {} ticks: {} published, {} skipped, {} failed",
        buffer.accepted,
        buffer.rejected,
        buffer.evicted,
        scheduler.ticks,
        scheduler.published,
        scheduler.skipped,
        scheduler.failed
    );
    println!("{}", pipeline.status_line());
    Ok(())
}

/// Feeds the pipeline at the configured rate in bursts, going silent for a while
fn spawn_producer(
    pipeline: Arc<AffectPipeline>,
    running: Arc<AtomicBool>,
    config: &PipelineConfig,
) -> std::thread::JoinHandle<()> {
    let mut source = SyntheticEeg::new(SyntheticConfig {
        sampling_rate_hz: config.signal.sampling_rate_hz,
        channel_count: config.signal.channel_count,
        spike_probability: 0.001,
        ..SyntheticConfig::default()
    });
    let per_burst = (config.signal.sampling_rate_hz * BURST_INTERVAL.as_secs_f64()).round() as usize;

    std::thread::spawn(move || {
        let start = Instant::now();
        let mut announced = false;

        while running.load(Ordering::Relaxed) {
            let elapsed = start.elapsed();
            let disconnected = elapsed >= DISCONNECT_AT && elapsed < DISCONNECT_AT + DISCONNECT_FOR;

            if disconnected {
                if !announced {
                    tracing::warn!(seconds = DISCONNECT_FOR.as_secs(), "simulating headband disconnect");
                    announced = true;
                }
            } else {
                for sample in source.by_ref().take(per_burst.max(1)) {
                    if let Err(err) = pipeline.ingest(sample) {
                        tracing::warn!(error = %err, "sample dropped");
                    }
                }
            }

            std::thread::sleep(BURST_INTERVAL);
        }
    })
}

/// Prints each tick outcome as it is broadcast
fn spawn_printer(
    pipeline: Arc<AffectPipeline>,
    running: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    let events = pipeline.events();
    tokio::task::spawn_blocking(move || {
        while running.load(Ordering::Relaxed) {
            let Ok(event) = events.recv_timeout(Duration::from_millis(250)) else {
                continue;
            };

            match event.kind {
                TickEventKind::Published { label, confidence } => {
                    println!("[tick {}] {} ({:.2})", event.tick, label, confidence)
                }
                TickEventKind::Skipped(reason) => {
                    println!("[tick {}] {}: {}", event.tick, event.state, reason)
                }
                TickEventKind::Failed { message, .. } => {
                    println!("[tick {}] failed: {}", event.tick, message)
                }
            }
        }
    })
}

/// Handmade weights: frontal alpha leans positive, beta leans negative
fn demo_model(config: &PipelineConfig) -> LinearSoftmaxClassifier {
    let channels = config.signal.channel_count;
    let bands = &config.features.bands;
    let stats_len = channels * STATISTICAL_FEATURE_COUNT;
    let feature_len = stats_len + channels * bands.len();

    let mut weights = vec![vec![0.0; feature_len]; EmotionLabel::ALL.len()];
    for ch in 0..channels {
        for (b, band) in bands.iter().enumerate() {
            let idx = stats_len + ch * bands.len() + b;
            match band.name.as_str() {
                "alpha" => weights[EmotionLabel::Positive.index()][idx] = 0.05,
                "beta" => weights[EmotionLabel::Negative.index()][idx] = 0.2,
                _ => {}
            }
        }
    }

    let bias = vec![0.0, 0.0, 1.0];
    LinearSoftmaxClassifier {
        weights,
        bias,
        channels: Some(channels),
    }
}
