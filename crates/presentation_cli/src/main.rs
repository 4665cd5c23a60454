//! Sarvam speech CLI
//!
//! Command-line front-end for synthesis, transcription and live capture.

#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use speech_client::{
    AudioData, AudioSource, AudioStore, LanguageCode, SarvamSpeechProvider, SlotValue, Speaker,
    SpeechConfig, SynthesisOptions, SynthesisSession, Transcription, TranscriptionOptions,
    TranscriptionSession, format_byte_size,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sarvam speech CLI
#[derive(Parser)]
#[command(name = "sarvam-cli")]
#[command(author, version, about = "Speech synthesis and transcription via Sarvam", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert text to speech and save the audio
    ///
    /// Newlines in the text are spoken as sentence breaks.
    /// Example: sarvam-cli speak "Namaste" --output namaste.wav --speaker arvind
    Speak {
        /// Text to synthesize
        text: String,

        /// Where to write the audio
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        tuning: SynthesisArgs,
    },

    /// Transcribe an audio file
    ///
    /// Example: sarvam-cli transcribe clip.mp3 --language hi-IN
    Transcribe {
        /// Audio file (wav, mp3, webm, ogg, flac, m4a)
        file: PathBuf,

        #[command(flatten)]
        params: TranscriptionArgs,
    },

    /// Record from the default microphone
    ///
    /// Stops after the given duration or on Ctrl-C.
    #[cfg(feature = "microphone")]
    Record {
        /// Maximum recording length in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Where to write the recording (WAV)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Transcribe the recording afterwards
        #[arg(long)]
        transcribe: bool,

        #[command(flatten)]
        params: TranscriptionArgs,
    },

    /// Format a byte count for display
    Size {
        /// Number of bytes
        bytes: u64,
    },
}

/// Overrides for the configured synthesis tuning
#[derive(Debug, Default, Args)]
struct SynthesisArgs {
    /// Voice (meera, pavithra, maitreyi, arvind, amol, amartya)
    #[arg(short, long)]
    speaker: Option<Speaker>,

    /// Target language tag, e.g. hi-IN
    #[arg(short, long)]
    language: Option<String>,

    /// Pitch shift (-1.0 to 1.0)
    #[arg(long, allow_negative_numbers = true)]
    pitch: Option<f32>,

    /// Speaking pace (0.3 to 3.0)
    #[arg(long)]
    pace: Option<f32>,

    /// Loudness (0.1 to 3.0)
    #[arg(long)]
    loudness: Option<f32>,

    /// Output sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Synthesis model
    #[arg(short, long)]
    model: Option<String>,
}

impl SynthesisArgs {
    fn apply(self, mut options: SynthesisOptions) -> SynthesisOptions {
        if let Some(speaker) = self.speaker {
            options.speaker = speaker;
        }
        if let Some(language) = self.language {
            options.target_language = language;
        }
        if let Some(pitch) = self.pitch {
            options.pitch = pitch;
        }
        if let Some(pace) = self.pace {
            options.pace = pace;
        }
        if let Some(loudness) = self.loudness {
            options.loudness = loudness;
        }
        if let Some(sample_rate) = self.sample_rate {
            options.sample_rate = sample_rate;
        }
        if let Some(model) = self.model {
            options.model = model;
        }
        options
    }
}

/// Overrides for the configured transcription parameters
#[derive(Debug, Default, Args)]
struct TranscriptionArgs {
    /// Spoken language tag, or "unknown" to auto-detect
    #[arg(short, long)]
    language: Option<String>,

    /// Transcription model
    #[arg(short, long)]
    model: Option<String>,
}

impl TranscriptionArgs {
    fn apply(self, mut options: TranscriptionOptions) -> TranscriptionOptions {
        if let Some(language) = self.language {
            options.language = LanguageCode::from(language);
        }
        if let Some(model) = self.model {
            options.model = model;
        }
        options
    }
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn load_config() -> anyhow::Result<SpeechConfig> {
    SpeechConfig::load().context("Failed to load configuration (is SARVAM__API_KEY set?)")
}

async fn write_audio(path: &Path, audio: &AudioData) -> anyhow::Result<()> {
    tokio::fs::write(path, audio.data())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "💾 Saved {} ({}, {})",
        path.display(),
        audio.mime_type(),
        format_byte_size(audio.size_bytes() as u64)
    );
    Ok(())
}

fn print_transcription(transcription: &Transcription) {
    println!("📝 {}", transcription.text);
    if let Some(language) = &transcription.language {
        println!("🌐 Language: {language}");
    }
}

async fn transcribe(
    session: &TranscriptionSession,
    source: AudioSource,
) -> anyhow::Result<()> {
    match session.submit(Some(source)).await {
        Some(SlotValue::Ready(transcription)) => {
            print_transcription(&transcription);
            Ok(())
        },
        Some(SlotValue::Failed(message)) => bail!("{message}"),
        Some(SlotValue::Empty) | None => bail!("Transcription produced no result"),
    }
}

async fn speak(
    config: SpeechConfig,
    text: &str,
    output: &Path,
    tuning: SynthesisArgs,
) -> anyhow::Result<()> {
    let options = tuning.apply(config.synthesis.clone());
    let provider = Arc::new(SarvamSpeechProvider::new(config)?);
    let session = SynthesisSession::new(provider, AudioStore::new(), options);

    info!(speaker = %session.options().speaker, "Synthesizing speech");

    match session.submit(text).await {
        Some(SlotValue::Ready(_)) => {
            let audio = session
                .audio()
                .context("Synthesized audio is no longer available")?;
            write_audio(output, &audio).await
        },
        Some(SlotValue::Failed(message)) => bail!("{message}"),
        Some(SlotValue::Empty) | None => bail!("Synthesis produced no result"),
    }
}

async fn transcribe_file(
    config: SpeechConfig,
    file: &Path,
    params: TranscriptionArgs,
) -> anyhow::Result<()> {
    let options = params.apply(config.transcription.clone());
    let audio = AudioData::from_file(file).await?;
    println!(
        "🎧 Uploading {} ({})",
        file.display(),
        format_byte_size(audio.size_bytes() as u64)
    );

    let provider = Arc::new(SarvamSpeechProvider::new(config)?);
    let session = TranscriptionSession::new(provider, AudioStore::new(), options);
    transcribe(&session, AudioSource::Upload(audio)).await
}

#[cfg(feature = "microphone")]
async fn record(
    config: SpeechConfig,
    seconds: u64,
    output: Option<PathBuf>,
    then_transcribe: bool,
    params: TranscriptionArgs,
) -> anyhow::Result<()> {
    use std::time::Duration;

    use speech_client::{CpalMicrophone, RecordingController};

    let store = AudioStore::new();
    let mut controller = RecordingController::new(Arc::new(CpalMicrophone::new()), store.clone());

    controller.start().await?;
    println!("🎙️  Recording for up to {seconds}s (Ctrl-C to stop early)...");

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(seconds)) => {},
        _ = tokio::signal::ctrl_c() => {},
    }

    let handle = controller
        .stop()
        .await?
        .context("Recording produced no audio")?;
    let audio = store
        .get(&handle)
        .context("Recording is no longer available")?;
    println!("⏹️  Captured {}", format_byte_size(audio.size_bytes() as u64));

    if let Some(path) = output {
        write_audio(&path, &audio).await?;
    }

    if then_transcribe {
        let options = params.apply(config.transcription.clone());
        let provider = Arc::new(SarvamSpeechProvider::new(config)?);
        let session = TranscriptionSession::new(provider, store, options);
        transcribe(&session, AudioSource::Recording(handle)).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Speak {
            text,
            output,
            tuning,
        } => speak(load_config()?, &text, &output, tuning).await,

        Commands::Transcribe { file, params } => {
            transcribe_file(load_config()?, &file, params).await
        },

        #[cfg(feature = "microphone")]
        Commands::Record {
            seconds,
            output,
            transcribe,
            params,
        } => record(load_config()?, seconds, output, transcribe, params).await,

        Commands::Size { bytes } => {
            println!("{}", format_byte_size(bytes));
            Ok(())
        },
    }
}
