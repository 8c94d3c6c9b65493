use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use moien::dialogue::prompt::build_system_prompt;
use moien::dialogue::{DialogueProviders, ReplyMode, TARGET_LANGUAGE, TranscriptionFallback};
use moien::session::Mailer;
use moien::voice::{
    AudioCapture, AudioPlayback, MicrophoneFeed, SampleTap, SpeechRequest, SpeechSynthesizer,
    Transcriber, TtsClient, calculate_energy,
};
use moien::{Config, FileArchive, LocalHost, LuxAsr, OpenAiChat, TurnOrchestrator};

/// Moien - spoken-dialogue loop for a Luxembourgish-speaking robot
#[derive(Parser)]
#[command(name = "moien", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Speak replies sentence by sentence as they stream in
    #[arg(long, global = true)]
    streaming: bool,

    /// Open the session with a generated greeting
    #[arg(long, global = true)]
    greet: bool,

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
    /// Synthesize and play a sentence
    TestTts {
        /// Text to speak
        #[arg(default_value = "Moien! Dëst ass en Test.")]
        text: String,
    },
    /// Transcribe a WAV file with the primary provider
    Transcribe {
        /// Mono 16-bit WAV file
        file: PathBuf,
    },
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,moien=info",
        1 => "info,moien=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if cli.streaming {
        config.dialogue.reply_mode = ReplyMode::Streaming;
    }
    if cli.greet {
        config.dialogue.greet = true;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(&config, duration).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Transcribe { file } => transcribe(&config, &file).await,
            Command::ConfigPath => {
                match moien::config::file::config_file_path() {
                    Some(path) => println!("{}", path.display()),
                    None => println!("no config directory on this platform"),
                }
                Ok(())
            }
        };
    }

    tracing::info!(
        participant = %config.session.participant_id,
        task = %config.session.task_id,
        model = %config.llm.model,
        reply_mode = ?config.dialogue.reply_mode,
        "starting dialogue loop"
    );
    tracing::debug!(?config, "loaded configuration");

    let capture = Arc::new(AudioCapture::new());
    let mut host = LocalHost::new(&config, Arc::clone(&capture))?;

    let primary: Arc<dyn Transcriber> = Arc::new(LuxAsr::new(
        config.asr.url.clone(),
        config.asr.timeout,
        config.asr.accept_invalid_certs,
    )?);
    let providers = DialogueProviders {
        transcription: TranscriptionFallback::new(
            Some(primary),
            config.sample_rate,
            config.asr.timeout,
        ),
        chat: Arc::new(OpenAiChat::new(
            config.llm.url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
            build_system_prompt(config.llm.persona.as_deref()),
            config.llm.timeout,
        )?),
        tts: Arc::new(TtsClient::new(config.tts.url.clone(), config.tts.timeout)?),
    };

    let archive = FileArchive::new(
        config.session.log_dir.clone(),
        config.session.mail.clone().map(Mailer::new),
    );

    let mut orchestrator = TurnOrchestrator::new(
        config.dialogue_settings(),
        capture,
        providers,
        Arc::new(archive),
        config.session_meta(),
    );

    orchestrator.run(&mut host).await;

    Ok(())
}

/// Test microphone input
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = Arc::new(AudioCapture::new());
    let tap = SampleTap::default();
    let feed = MicrophoneFeed::start(Arc::clone(&capture), Arc::clone(&tap), config.sample_rate)?;
    capture.start();

    println!("Sample rate: {} Hz", config.sample_rate);
    println!(
        "Capture window: {}",
        if feed.capture_supported() {
            "stereo 16-bit"
        } else {
            "unsupported (mono device)"
        }
    );
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = tap
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();
        let energy = calculate_energy(&samples);
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

    let pcm = capture.stop();
    drop(feed);

    println!("\n---");
    println!("Captured {} bytes of mono PCM", pcm.len());
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Synthesize a sentence and play it
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TtsClient::new(config.tts.url.clone(), config.tts.timeout)?;
    let request = SpeechRequest {
        text,
        lang: TARGET_LANGUAGE,
        transcript: "",
        length_scale: config.tts.length_scale,
    };

    println!("Synthesizing speech...");
    let url = tts.synthesize(&request).await?;
    println!("Audio URL: {url}");

    let audio = reqwest::get(&url).await?.error_for_status()?.bytes().await?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    tokio::task::spawn_blocking(move || playback.play_encoded(&audio)).await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Send a WAV file to the primary transcription provider
async fn transcribe(config: &Config, file: &Path) -> anyhow::Result<()> {
    let wav = tokio::fs::read(file).await?;
    let asr = LuxAsr::new(
        config.asr.url.clone(),
        config.asr.timeout,
        config.asr.accept_invalid_certs,
    )?;

    let text = asr.transcribe(&wav).await?;
    if text.is_empty() {
        println!("(no speech recognized)");
    } else {
        println!("{text}");
    }

    Ok(())
}
