use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nova_assistant::assistant::speech_from_config;
use nova_assistant::voice::{
    AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE, SAMPLE_RATE, Speech, UtteranceSegmenter,
    calculate_energy,
};
use nova_assistant::{AnswerService, Assistant, CachedTranslator, Config, Translator};

/// Nova - a voice assistant for the terminal
#[derive(Parser)]
#[command(name = "nova", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only answer typed questions; do not open the microphone
    #[arg(long, env = "NOVA_TEXT_ONLY")]
    text_only: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question and print the answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Speak text aloud
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Show live input levels against a calibrated speech threshold
    TestMic {
        /// Seconds to listen
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Play a test chime
    TestSpeaker,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,nova_assistant=info",
        1 => "info,nova_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    // Stdout carries the transcript
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { question } => ask(&question.join(" ")).await,
            Command::Say { text } => say(&text).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Setup => nova_assistant::setup::run_setup(),
        };
    }

    let config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    let assistant = Assistant::from_config(config)?;
    assistant.run(!cli.text_only).await?;

    Ok(())
}

/// Translate and answer one question, then speak the reply
async fn ask(question: &str) -> anyhow::Result<()> {
    let config = Config::load();
    let answers = AnswerService::from_config(&config)?;
    let translator = CachedTranslator::from_config(&config.translation);

    let canonical = translator.translate(question).await;
    if canonical != question {
        tracing::debug!(%canonical, "translated question");
    }

    let reply = answers.answer(&canonical).await;
    println!("{}: {reply}", config.assistant.name);
    speech_from_config(&config).speak(&reply).await;

    Ok(())
}

/// Speak text through the configured voice
async fn say(text: &str) -> anyhow::Result<()> {
    let config = Config::load();
    if !config.voice.enabled {
        anyhow::bail!("voice output is disabled in the configuration");
    }

    println!("Speaking: {text}");
    speech_from_config(&config).speak(text).await;
    Ok(())
}

/// Show live input levels against a calibrated speech threshold
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Calibrating: stay quiet for a second...");
    tokio::time::sleep(Duration::from_secs(1)).await;
    capture.check_health()?;

    let mut segmenter = UtteranceSegmenter::new(Duration::from_millis(800), Duration::from_secs(8));
    let threshold = segmenter.calibrate(&capture.drain());
    println!("Speech threshold: {threshold:.4} (at {SAMPLE_RATE} Hz)");
    println!("Now speak for {duration} seconds.\n");

    let mut utterances = 0;
    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;
        capture.check_health()?;

        let samples = capture.drain();
        let energy = calculate_energy(&samples);
        if segmenter.push(&samples).is_some() {
            utterances += 1;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bar = ((energy * 200.0).min(40.0)) as usize;
        let label = if energy > threshold { "speech" } else { "quiet" };
        println!("[{second:>2}s] {energy:.4} {:<40} {label}", "#".repeat(bar));
    }
    capture.stop();

    println!("\n{utterances} utterance(s) segmented.");
    if utterances == 0 {
        println!("Nothing crossed the threshold. Check the default input device and its volume.");
    }
    Ok(())
}

/// Play a short three-note chime on the default output device
async fn test_speaker() -> anyhow::Result<()> {
    const NOTES: [f32; 3] = [523.25, 659.25, 783.99];
    const NOTE_SECS: f32 = 0.4;

    let playback = AudioPlayback::new()?;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let samples: Vec<f32> = {
        let rate = PLAYBACK_SAMPLE_RATE as f32;
        let per_note = (rate * NOTE_SECS) as usize;
        NOTES
            .iter()
            .flat_map(|&freq| {
                (0..per_note).map(move |i| {
                    let t = i as f32 / rate;
                    // Linear fade-out avoids clicks between notes
                    let envelope = 1.0 - i as f32 / per_note as f32;
                    (std::f32::consts::TAU * freq * t).sin() * 0.3 * envelope
                })
            })
            .collect()
    };

    println!("Playing a chime at {PLAYBACK_SAMPLE_RATE} Hz...");
    tokio::task::spawn_blocking(move || playback.play_blocking(samples)).await??;
    println!("Done. No sound? Check the default output device and its volume.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["nova", "-vv", "ask", "what", "is", "rust"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Command::Ask { question }) if question.len() == 3));

        let cli = Cli::try_parse_from(["nova", "test-mic", "-d", "3"]).unwrap();
        assert!(matches!(cli.command, Some(Command::TestMic { duration: 3 })));

        let cli = Cli::try_parse_from(["nova", "--text-only"]).unwrap();
        assert!(cli.text_only);
        assert!(cli.command.is_none());

        assert!(Cli::try_parse_from(["nova", "ask"]).is_err());
    }
}
