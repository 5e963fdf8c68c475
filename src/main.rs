use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use voice_tutor::audio::{
    self, AudioCapture, AudioPlayback, DeviceMicrophone, OUTPUT_SAMPLE_RATE, OutputClock,
    PlaybackScheduler, pcm,
};
use voice_tutor::config::Overrides;
use voice_tutor::session::COMMAND_HELP;
use voice_tutor::{
    Assistant, Command, Config, GeminiConnector, Language, SearchBackend, WebSearchTool,
};

/// Tutor - real-time voice assistant and language tutor
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.config/voice-tutor/config.toml)
    #[arg(short, long, env = "TUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Spoken language (en, pt, es, fr, de, it, ja)
    #[arg(short, long)]
    language: Option<Language>,

    /// Start in teaching mode
    #[arg(long)]
    teach: bool,

    /// Live model identifier
    #[arg(long)]
    model: Option<String>,

    /// Prebuilt voice name
    #[arg(long)]
    voice: Option<String>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start a voice conversation (default)
    Run,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
        /// Save the captured audio as a WAV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Test speaker output through the playback scheduler
    TestSpeaker,
    /// Search the web
    Search {
        /// Query text
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_tutor=info",
        1 => "info,voice_tutor=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        language: cli.language,
        teaching_mode: cli.teach.then_some(true),
        model: cli.model,
        voice_name: cli.voice,
    };
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Run => {
            let config = Config::load(config_path, overrides)?;
            run_session(config).await
        }
        CliCommand::TestMic { duration, output } => {
            let config = Config::load(config_path, overrides)?;
            test_mic(duration, output.as_deref(), config.frame_size).await
        }
        CliCommand::TestSpeaker => test_speaker().await,
        CliCommand::Search { query } => {
            let config = Config::load(config_path, overrides)?;
            search(&config.search_url, &query.join(" ")).await
        }
        CliCommand::Setup => voice_tutor::setup::run_setup(config_path),
    }
}

/// Run the interactive voice session
#[allow(clippy::future_not_send)]
async fn run_session(config: Config) -> anyhow::Result<()> {
    let settings = config.session_settings();
    let api_key = config
        .api_key
        .context("no Gemini API key: set GEMINI_API_KEY or run `tutor setup`")?;

    tracing::info!(
        model = %settings.model,
        language = settings.language.code(),
        teaching = settings.teaching_mode,
        "starting voice tutor"
    );

    let connector = GeminiConnector::new(&config.live_url, api_key)?;
    let (playback, ended) = AudioPlayback::new()?;
    let mic = DeviceMicrophone::new(config.frame_size);
    let search: Arc<dyn SearchBackend> = Arc::new(WebSearchTool::new(config.search_url));

    let mut assistant = Assistant::new(connector, playback, mic, search, settings);

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    spawn_stdin_reader(cmd_tx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send(Command::Quit).await;
        }
    });

    println!("{COMMAND_HELP}");
    assistant
        .run(cmd_rx, ended, |lines| {
            for line in lines {
                println!("{line}");
            }
        })
        .await;

    Ok(())
}

/// Read commands from stdin on a plain thread so it never holds up exit
fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Ok(Some(cmd)) => {
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(hint) => eprintln!("{hint}"),
            }
        }
        let _ = tx.blocking_send(Command::Quit);
    });
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64, output: Option<&Path>, frame_size: usize) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(frame_size)?;
    let mut frames = capture.start()?;

    println!("Sample rate: {} Hz, frame size: {frame_size}", capture.sample_rate());
    println!("---");

    let mut recorded = Vec::new();
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut second = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            second.extend(frame);
        }

        let energy = audio::rms(&second);
        let peak = second.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        recorded.extend(second);
    }

    capture.stop();

    println!("\n---");
    println!("Dropped frames: {}", capture.dropped_frames());

    if let Some(path) = output {
        let wav = audio::samples_to_wav(&recorded, capture.sample_rate())?;
        std::fs::write(path, wav)?;
        println!("Saved {} samples to {}", recorded.len(), path.display());
    }

    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with three back-to-back tones
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear three rising tones with no gaps\n");

    let (mut playback, mut ended) = AudioPlayback::new()?;
    let mut scheduler = PlaybackScheduler::new();

    println!(
        "Sample rate: {OUTPUT_SAMPLE_RATE} Hz, channels: {}",
        playback.channels()
    );
    println!("---");

    for frequency in [440.0_f32, 554.37, 659.25] {
        let samples = tone(frequency, 0.5, OUTPUT_SAMPLE_RATE);
        // Go through the wire format so the tone exercises the codec too
        let packet = pcm::encode_at(&samples, OUTPUT_SAMPLE_RATE);
        let buffer = pcm::decode(&packet, OUTPUT_SAMPLE_RATE, 1)?;
        let now = playback.now();
        let source = scheduler.schedule(&mut playback, buffer, now);
        println!(
            "{frequency:.0} Hz at {:.3}s for {:.3}s",
            source.start, source.duration
        );
    }

    while scheduler.active_count() > 0 {
        match tokio::time::timeout(Duration::from_secs(3), ended.recv()).await {
            Ok(Some(id)) => {
                scheduler.on_ended(id);
            }
            Ok(None) | Err(_) => {
                scheduler.interrupt(&mut playback);
                anyhow::bail!("playback did not finish; is the output device running?");
            }
        }
    }

    println!("\n---");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Generate a sine tone at 30% volume
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect()
}

/// Run one web search and print the answer
async fn search(endpoint: &str, query: &str) -> anyhow::Result<()> {
    let tool = WebSearchTool::new(endpoint);
    let answer = tool.search(query).await?;
    println!("{answer}");
    Ok(())
}
