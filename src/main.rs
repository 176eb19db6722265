use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cortex_live::voice::{CpalPlayback, InputDevice as _, MicCapture, OutputDevice as _};
use cortex_live::{Config, CpalDeviceFactory, LiveConnector, PlaybackScheduler, SessionEngine};

/// Cortex - Real-time voice assistant over Gemini Live
#[derive(Parser)]
#[command(name = "cortex", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.config/cortex/config.toml)
    #[arg(short, long, env = "CORTEX_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Record the microphone to a WAV file
    Record {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Output path
        #[arg(default_value = "capture.wav")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,cortex_live=info",
        1 => "info,cortex_live=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Record { duration, output } => record(duration, &output).await,
        };
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::info!(model = %config.model, "starting cortex");

    let wake_words = config.wake_words.join("\" or \"");
    let engine = SessionEngine::new(
        config,
        Arc::new(LiveConnector::new()),
        Arc::new(CpalDeviceFactory),
    );

    engine.start().await?;
    tracing::info!("cortex ready - say \"{wake_words}\"");

    let mut states = engine.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                println!("[{state:?}]");
                if let Some(message) = engine.transcript().last() {
                    let speaker = match message.speaker {
                        cortex_live::Speaker::User => "you",
                        cortex_live::Speaker::Assistant => "cortex",
                    };
                    println!("  {speaker}: {}", message.text);
                }
                match state {
                    cortex_live::SessionState::Error => {
                        if let Some(error) = engine.last_error() {
                            eprintln!("session failed: {error}");
                        }
                        break;
                    }
                    cortex_live::SessionState::Idle => {
                        println!("session ended");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    engine.stop().await;
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let sample_rate = 16_000_u32;
    let mut capture = MicCapture::new(sample_rate);
    capture.start()?;

    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain(usize::MAX);
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Record the microphone to a WAV file
async fn record(duration: u64, output: &std::path::Path) -> anyhow::Result<()> {
    let sample_rate = 16_000_u32;
    let mut capture = MicCapture::new(sample_rate);
    capture.start()?;

    println!("Recording for {duration} seconds...");
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let samples = capture.drain(usize::MAX);
    capture.stop();

    let wav = cortex_live::voice::samples_to_wav(&samples, sample_rate)?;
    std::fs::write(output, wav)?;
    println!("Wrote {} samples to {}", samples.len(), output.display());

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_u32;
    let scheduler = PlaybackScheduler::new(sample_rate);
    let mut playback = CpalPlayback::open(sample_rate, scheduler.shared())?;

    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {num_samples} samples at {sample_rate} Hz...");

    scheduler.enqueue(samples, playback.clock());
    tokio::time::sleep(Duration::from_secs_f32(duration_secs + 0.5)).await;
    playback.close();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: aplay -l (to list devices)");

    Ok(())
}
