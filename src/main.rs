use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use valet_assistant::voice::{AudioFrame, AudioPlayer, FrameStream, SpeechStreamer, StopToken};
use valet_assistant::{interface, prompt, Assistant, Config, GeminiChat, ToolRegistry};

/// Valet - voice-enabled conversational assistant
#[derive(Parser)]
#[command(name = "valet", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice output (for headless hosts without audio hardware)
    #[arg(long, env = "VALET_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test speaker output with a sine wave
    TestSpeaker,
    /// Test streaming synthesis and playback end to end
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,valet_assistant=info",
        1 => "info,valet_assistant=debug",
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
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(cli.disable_voice, &text).await,
        };
    }

    run_assistant(cli.disable_voice).await
}

/// Wire the pipeline together and hand control to the console adapter.
async fn run_assistant(disable_voice: bool) -> anyhow::Result<()> {
    let config = Config::load(disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let system_prompt = prompt::system_prompt(config.persona.as_deref());
    let gemini_key = config
        .api_keys
        .gemini
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not configured"))?;

    let chat = Arc::new(GeminiChat::new(gemini_key, &config.chat, system_prompt));
    let tools = ToolRegistry::builtin();

    let voice = if config.voice.enabled {
        let key = config
            .api_keys
            .elevenlabs
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ELEVENLABS_API_KEY not configured"))?;
        Some(SpeechStreamer::new(key, &config.voice))
    } else {
        None
    };

    tracing::info!(
        model = %config.chat.model,
        voice = config.voice.enabled,
        "assistant ready"
    );

    let (notify_tx, notify_rx) = mpsc::channel(64);
    let (handle, core) = Assistant::new(chat, tools, voice, notify_tx).spawn();

    interface::run_console(handle, notify_rx, &config.assistant_name).await?;

    // The console consumed the last handle; the core drains and stops.
    core.await?;
    Ok(())
}

/// Play two seconds of a 440 Hz tone through the playback pipeline.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = valet_assistant::SAMPLE_RATE;
    let frequency = 440.0_f32;
    let num_samples = (sample_rate as usize) * 2;

    let pcm: Vec<u8> = (0..num_samples)
        .flat_map(|i| {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3;
            ((sample * 32_767.0) as i16).to_le_bytes()
        })
        .collect();

    // Feed the tone through the same frame path spoken replies use.
    let (tx, rx) = mpsc::channel(8);
    let stop = StopToken::new();
    let frames = FrameStream::from_channel(rx, stop.clone());

    let chunk_bytes = 4800; // 100ms per frame
    tokio::spawn(async move {
        for (index, chunk) in pcm.chunks(chunk_bytes).enumerate() {
            let frame = AudioFrame {
                index: index as u64,
                data: chunk.to_vec(),
            };
            if tx.send(Ok(frame)).await.is_err() {
                return;
            }
        }
    });

    let player = AudioPlayer::open()?;
    player.play(frames, stop).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Synthesize a phrase and play it, exercising the full voice path.
async fn test_tts(disable_voice: bool, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(disable_voice)?;
    let key = config
        .api_keys
        .elevenlabs
        .clone()
        .ok_or_else(|| anyhow::anyhow!("ELEVENLABS_API_KEY not configured"))?;

    let mut streamer = SpeechStreamer::new(key, &config.voice);

    println!("Synthesizing speech...");
    let frames = streamer.synthesize(text).await?;

    println!("Playing audio...");
    let player = AudioPlayer::open()?;
    player.play(frames, StopToken::new()).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}
