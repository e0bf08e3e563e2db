use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis::schedule::TimerRegistry;
use jarvis::voice::{AudioCapture, CommandSynthesizer, Speaker, SpeechOutput, calculate_energy};
use jarvis::{Config, Daemon};

/// Jarvis - Voice-driven command dispatcher
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/jarvis/config.toml)
    #[arg(short, long, env = "JARVIS_CONFIG")]
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
    /// Speak text through the configured synthesizer
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! Jarvis speech output is working.")]
        text: String,
    },
    /// Run one command through the dispatcher, without audio input
    Dispatch {
        /// Command words, e.g. `what time is it`
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
    /// List pending reminders
    Reminders,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,jarvis=info",
        1 => "info,jarvis=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
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
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::Say { text } => say(&config, &text).await,
            Command::Dispatch { command } => dispatch(config, &command.join(" ")).await,
            Command::Reminders => list_reminders(config),
        };
    }

    tracing::info!(name = %config.assistant.name, "starting jarvis");

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

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
    println!("  4. Raise capture.energy_threshold if background noise triggers phrases");

    Ok(())
}

/// Speak text and wait for it to finish
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let synth = Arc::new(CommandSynthesizer::new(&config.voice));
    let speech = SpeechOutput::new(synth)?;

    speech.speak(text);
    speech.finish().await;

    Ok(())
}

/// Dispatch one typed command and speak the response
async fn dispatch(config: Config, command: &str) -> anyhow::Result<()> {
    let daemon = Daemon::new(config)?;
    let speech = daemon.speech_output()?;
    let speaker: Arc<dyn Speaker> = speech.clone();
    let timers = TimerRegistry::new(Arc::clone(&speaker));
    let dispatcher = daemon.dispatcher(speaker, timers.clone())?;

    let intent = dispatcher.dispatch(command).await;
    println!("intent: {intent:?}");
    speech.finish().await;

    if !timers.active().is_empty() {
        println!("note: timers only run while the assistant is running");
        timers.shutdown();
    }

    Ok(())
}

/// Print pending reminders
fn list_reminders(config: Config) -> anyhow::Result<()> {
    let daemon = Daemon::new(config)?;
    let reminders = daemon.reminder_store().list()?;

    if reminders.is_empty() {
        println!("No pending reminders");
        return Ok(());
    }

    for reminder in reminders {
        println!(
            "{:>4}  {}  {}",
            reminder.id,
            reminder.remind_at.format("%Y-%m-%d %H:%M"),
            reminder.message
        );
    }

    Ok(())
}
