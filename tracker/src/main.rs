use anyhow::Context;
use clap::Parser;
use generator::fleet::FleetConfig;
use gui_bridge::bridge::GuiBridge;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use vesselcore::schedule::RunSummary;
use workflow::config::TrackerConfig;
use workflow::runner::{Runner, SourceMode};

mod feed;
mod generator;
mod gui_bridge;
mod persistence;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Vessel position prediction and validation driver")]
struct Args {
    /// Tracker config in YAML
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    /// Poll a seeded synthetic fleet instead of the live provider
    #[arg(long, default_value_t = false)]
    simulate: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// Replay recorded snapshots from a JSON file
    #[arg(long, conflicts_with = "simulate")]
    replay: Option<PathBuf>,
    /// Keep the GUI bridge alive after the run until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long)]
    geojson: Option<PathBuf>,
    #[arg(long)]
    lookahead_minutes: Option<f64>,
    #[arg(long)]
    interval_minutes: Option<f64>,
    #[arg(long)]
    total_minutes: Option<f64>,
    #[arg(long)]
    radius_km: Option<f64>,
}

impl Args {
    fn apply_overrides(&self, config: &mut TrackerConfig) {
        if let Some(value) = self.lookahead_minutes {
            config.lookahead_minutes = value;
        }
        if let Some(value) = self.interval_minutes {
            config.interval_minutes = value;
        }
        if let Some(value) = self.total_minutes {
            config.total_duration_minutes = value;
        }
        if let Some(value) = self.radius_km {
            config.validation_radius_km = value;
        }
        if let Some(path) = self.csv.clone() {
            config.output_paths.csv_path = Some(path);
        }
        if let Some(path) = self.geojson.clone() {
            config.output_paths.geojson_path = Some(path);
        }
    }

    fn source_mode(&self) -> SourceMode {
        if let Some(path) = self.replay.clone() {
            SourceMode::Replay(path)
        } else if self.simulate {
            SourceMode::Simulated(FleetConfig {
                seed: self.seed.unwrap_or_default(),
                ..FleetConfig::default()
            })
        } else {
            SourceMode::Live
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let counters = &summary.counters;
    let deviations = &summary.deviations;
    println!(
        "Run {} after {:.0}s -> cycles {} (completed {}, skipped {}), fetch failures {}",
        if summary.cancelled { "cancelled" } else { "finished" },
        summary.elapsed.as_secs_f64(),
        counters.cycles_attempted,
        counters.cycles_completed,
        counters.cycles_skipped,
        counters.fetch_failures
    );
    println!(
        "Records {} ({} within radius), mean {:.3} km, rms {:.3} km, max {:.3} km",
        deviations.records,
        deviations.within_tolerance,
        deviations.mean_km,
        deviations.rms_km,
        deviations.max_km
    );
    println!(
        "Reports skipped {}, duplicates {}, unmatched predictions {}",
        counters.reports_skipped, counters.duplicate_reports, counters.unmatched_predictions
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mode = args.source_mode();
    let live = matches!(mode, SourceMode::Live);

    let mut config = if args.config.exists() || live {
        TrackerConfig::load(&args.config)?
    } else {
        log::warn!(
            "{} not found; using built-in defaults for an offline run",
            args.config.display()
        );
        TrackerConfig::default()
    };
    args.apply_overrides(&mut config);
    config.validate(live).context("invalid tracker configuration")?;

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_err() {
                return;
            }
            log::warn!("Ctrl+C received; finishing the current cycle (press again to exit)");
            interrupt.cancel();
            if signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });

        let mut runner = Runner::new(config.clone());
        let server_shutdown = CancellationToken::new();
        if args.serve {
            let bridge = GuiBridge::new(config.default_location);
            bridge.serve(config.bridge_address, server_shutdown.clone())?;
            runner = runner.with_bridge(bridge);
        }

        let summary = runner.execute(&mode, cancel.clone()).await?;
        print_summary(&summary);

        if args.serve && !cancel.is_cancelled() {
            println!(
                "GUI bridge serving on http://{} (Ctrl+C to stop)...",
                config.bridge_address
            );
            cancel.cancelled().await;
        }
        server_shutdown.cancel();
        Ok::<(), anyhow::Error>(())
    })
}
