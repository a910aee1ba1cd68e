use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{info, warn};

use streaming_tts::config::ClientConfig;
use streaming_tts::core::tts::{BackendKind, StreamingTTS, SynthesisBackend, TTSEvent};

/// Streaming MiniMax text-to-speech client
#[derive(Parser, Debug)]
#[command(name = "streaming-tts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize text into a WAV file
    Speak {
        /// Text to speak; may start with an emotion tag such as "[happy]"
        #[arg(short = 't', long = "text", required = true, num_args = 1..)]
        text: Vec<String>,

        /// Output WAV file
        #[arg(short = 'o', long = "output", default_value = "output.wav")]
        output: PathBuf,

        /// Transport override (http or socket)
        #[arg(short = 'b', long = "backend")]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("streaming_tts=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)
            .map_err(|e| anyhow!("Failed to load config {}: {}", path.display(), e))?,
        None => ClientConfig::from_env().map_err(|e| anyhow!("Failed to load config: {}", e))?,
    };

    match cli.command {
        Commands::Speak {
            text,
            output,
            backend,
        } => {
            if let Some(backend) = backend {
                config.backend = backend.parse::<BackendKind>()?;
                config
                    .validate()
                    .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
            }
            speak(&config, &text, &output).await
        }
    }
}

/// Synthesizes each utterance in order and writes the audio to `output`.
async fn speak(config: &ClientConfig, utterances: &[String], output: &PathBuf) -> anyhow::Result<()> {
    let backend = SynthesisBackend::new(config.backend, config.to_connection(), config.to_settings())?;
    info!(
        "Using {} backend ({})",
        config.backend,
        backend.provider_name()
    );
    backend.start().await?;

    let mut pcm: Vec<i16> = Vec::new();
    let mut format: Option<(u32, u16)> = None;

    for utterance in utterances {
        let mut events = backend.synthesize(utterance);
        while let Some(event) = events.next().await {
            match event {
                TTSEvent::Started => info!("Synthesizing: {}", utterance),
                TTSEvent::Audio(chunk) => {
                    let chunk_format = (chunk.sample_rate, chunk.channels);
                    if format.is_some_and(|f| f != chunk_format) {
                        warn!("Audio format changed mid-run to {:?}", chunk_format);
                    }
                    format.get_or_insert(chunk_format);
                    pcm.extend(
                        chunk
                            .data
                            .chunks_exact(2)
                            .map(|b| i16::from_le_bytes([b[0], b[1]])),
                    );
                }
                TTSEvent::Stopped => {
                    if let Some(ttfb) = backend.last_ttfb() {
                        info!("Finished utterance (first audio after {:?})", ttfb);
                    }
                }
                TTSEvent::Error(e) => {
                    let _ = backend.stop().await;
                    return Err(anyhow!("Synthesis failed: {}", e));
                }
            }
        }
    }

    backend.stop().await?;

    let (sample_rate, channels) =
        format.ok_or_else(|| anyhow!("No audio was produced"))?;
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    for sample in &pcm {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    println!(
        "Wrote {} samples at {} Hz to {}",
        pcm.len(),
        sample_rate,
        output.display()
    );
    Ok(())
}
