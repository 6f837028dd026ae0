// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::{anyhow, Context, Result};
use bandforge::playback::SimulatedBackend;
use bandforge::{
    BandConfig, BandService, BandSession, HttpStudio, OfflineStudio, PlaybackController, Session,
    FINAL_MIX_KEY,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("BandForge - build a band around a solo recording");
    println!();
    println!("Usage: bandforge [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <FILE>        Load configuration from a YAML file");
    println!("  --print-config         Print the effective configuration and exit");
    println!("  --offline              Use the built-in offline studio instead of the backend");
    println!("  --instrument <NAME>    Instrument the user recorded (default piano)");
    println!("  --midi <PATH>          Reference to the user's MIDI upload");
    println!("  --audio <URI>          The user's own recording, added to the band");
    println!("  --direction <TEXT>     Conductor instruction applied after the first takes");
    println!("  --help                 Show this help message");
}

/// Parsed command line
#[derive(Debug)]
struct Options {
    config: Option<String>,
    print_config: bool,
    offline: bool,
    instrument: String,
    midi: String,
    audio: Option<String>,
    direction: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            print_config: false,
            offline: false,
            instrument: "piano".to_string(),
            midi: "user.mid".to_string(),
            audio: None,
            direction: None,
        }
    }
}

/// Returns `None` when help was requested
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--config" => options.config = Some(value("--config")?),
            "--print-config" => options.print_config = true,
            "--offline" => options.offline = true,
            "--instrument" => options.instrument = value("--instrument")?,
            "--midi" => options.midi = value("--midi")?,
            "--audio" => options.audio = Some(value("--audio")?),
            "--direction" => options.direction = Some(value("--direction")?),
            "--help" | "-h" => return Ok(None),
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
    }

    Ok(Some(options))
}

async fn run(options: Options, config: BandConfig) -> Result<()> {
    let service: Arc<dyn BandService> = if options.offline {
        Arc::new(OfflineStudio::new(&config.offline))
    } else {
        Arc::new(HttpStudio::new(&config.service)?)
    };
    let backend = Arc::new(SimulatedBackend::new());
    let playback = Arc::new(PlaybackController::new(backend.clone()));

    let mut session = Session::new(&options.instrument, &options.midi);
    if let Some(audio) = &options.audio {
        session = session.with_user_audio(audio);
    }
    let band = BandSession::new(session, config, service, playback)?;

    let roster = band
        .generate_roster()
        .await?
        .applied()
        .context("roster request was superseded")?;
    println!("Band: {}", roster.join(", "));

    for view in band.roster().into_iter().filter(|m| !m.is_user_track) {
        match band.request_generation(&view.instrument).await {
            Ok(_) => println!("  {} ready", view.instrument),
            Err(err) => println!("  {} failed: {}", view.instrument, err),
        }
    }

    if let Some(direction) = &options.direction {
        let report = band.request_overall_direction(direction).await?;
        println!(
            "Direction updated {} prompt(s), {} take(s) applied",
            report.updated.len(),
            report.applied_count()
        );
        for run in report.failures() {
            warn!(instrument = %run.instrument, "no new take after direction");
        }
    }

    match band.request_combine().await {
        Ok(outcome) => {
            if let Some(mix) = outcome.applied() {
                println!("Final mix: {}", mix.artifact_uri);
                band.play(FINAL_MIX_KEY)?;
                // Let the simulated player run for a moment
                for handle in backend.handles() {
                    handle.advance(Duration::from_secs(1));
                }
                info!(
                    position_ms = band
                        .playback()
                        .position(FINAL_MIX_KEY)
                        .map(|p| p.as_millis() as u64)
                        .unwrap_or(0),
                    "final mix playing"
                );
            }
        }
        Err(err) => println!("Combine failed: {}", err),
    }

    print!("{}", serde_yaml::to_string(&band.snapshot())?);
    band.stop_all();
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bandforge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            print_usage();
            std::process::exit(1);
        }
    };

    let config = match &options.config {
        Some(path) => BandConfig::load(path)?,
        None => BandConfig::default(),
    };

    if options.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(options, config))
}
