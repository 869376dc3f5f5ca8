//! Interactive first-run setup wizard (`nova setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    self, ApiKeysFileConfig, NovaConfigFile, VoiceFileConfig, WeatherFileConfig,
};
use crate::config::{DEFAULT_NAME, DEFAULT_WAKE_WORD};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Nova Setup\n");

    // Existing values become the defaults
    let mut config = file::load_config_file();
    let config_path = file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/nova/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Name and wake word
    let name: String = Input::new()
        .with_prompt("Assistant name")
        .default(
            config
                .assistant
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        )
        .interact_text()?;

    let wake_word: String = Input::new()
        .with_prompt("Wake word")
        .default(
            config
                .assistant
                .wake_words
                .as_ref()
                .and_then(|w| w.first().cloned())
                .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
        )
        .interact_text()?;

    config.assistant.name = Some(name);
    config.assistant.wake_words = Some(vec![wake_word]);

    // 2. Chat-completion key
    config.api_keys.mistral = prompt_key(
        "Mistral API key",
        "MISTRAL_API_KEY",
        config.api_keys.mistral.take(),
    )?;

    // 3. Voice
    let enable_voice = Confirm::new()
        .with_prompt("Speak replies and listen for the wake word?")
        .default(config.voice.enabled.unwrap_or(true))
        .interact()?;

    config.voice = if enable_voice {
        setup_voice(&config.voice, &mut config.api_keys)?
    } else {
        VoiceFileConfig {
            enabled: Some(false),
            ..VoiceFileConfig::default()
        }
    };

    // 4. Music
    let music_dir: String = Input::new()
        .with_prompt("Music directory (leave blank for the system default)")
        .allow_empty(true)
        .default(config.music.directory.clone().unwrap_or_default())
        .interact_text()?;
    config.music.directory = (!music_dir.is_empty()).then_some(music_dir);

    // 5. Weather (optional)
    let enable_weather = Confirm::new()
        .with_prompt("Enable the weather command (OpenWeatherMap)?")
        .default(config.weather.city.is_some())
        .interact()?;

    if enable_weather {
        config.api_keys.openweather = prompt_key(
            "OpenWeatherMap API key",
            "OPENWEATHER_API_KEY",
            config.api_keys.openweather.take(),
        )?;
        let city: String = Input::new()
            .with_prompt("City")
            .default(config.weather.city.clone().unwrap_or_default())
            .interact_text()?;
        config.weather = WeatherFileConfig { city: Some(city) };
    } else {
        config.weather = WeatherFileConfig::default();
    }

    file::write_config_file(&config_path, &config)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `nova -v` to start.");

    Ok(())
}

/// Ask for STT/TTS providers and whatever key they need
fn setup_voice(
    existing: &VoiceFileConfig,
    api_keys: &mut ApiKeysFileConfig,
) -> anyhow::Result<VoiceFileConfig> {
    let stt_providers = ["whisper", "deepgram"];
    let stt_idx = Select::new()
        .with_prompt("Speech-to-text provider")
        .items(&stt_providers)
        .default(provider_index(&stt_providers, existing.stt_provider.as_deref()))
        .interact()?;

    let tts_providers = ["openai", "elevenlabs"];
    let tts_idx = Select::new()
        .with_prompt("Text-to-speech provider")
        .items(&tts_providers)
        .default(provider_index(&tts_providers, existing.tts_provider.as_deref()))
        .interact()?;

    let stt_provider = stt_providers[stt_idx];
    let tts_provider = tts_providers[tts_idx];

    if stt_provider == "whisper" || tts_provider == "openai" {
        api_keys.openai = prompt_key("OpenAI API key", "OPENAI_API_KEY", api_keys.openai.take())?;
    }
    if stt_provider == "deepgram" {
        api_keys.deepgram = prompt_key(
            "Deepgram API key",
            "DEEPGRAM_API_KEY",
            api_keys.deepgram.take(),
        )?;
    }
    if tts_provider == "elevenlabs" {
        api_keys.elevenlabs = prompt_key("ElevenLabs API key", "", api_keys.elevenlabs.take())?;
    }

    let default_voice = match tts_provider {
        "openai" => "onyx",
        _ => "",
    };
    let tts_voice: String = Input::new()
        .with_prompt("Voice")
        .default(
            existing
                .tts_voice
                .clone()
                .unwrap_or_else(|| default_voice.to_string()),
        )
        .interact_text()?;

    Ok(VoiceFileConfig {
        enabled: Some(true),
        stt_provider: Some(stt_provider.to_string()),
        tts_provider: Some(tts_provider.to_string()),
        tts_voice: Some(tts_voice),
        ..existing.clone()
    })
}

/// Prompt for a secret, keeping the current value on blank input
fn prompt_key(
    label: &str,
    env_hint: &str,
    current: Option<String>,
) -> anyhow::Result<Option<String>> {
    let prompt = match (&current, env_hint.is_empty()) {
        (Some(key), _) => format!("{label} (current: {}, leave blank to keep)", mask_key(key)),
        (None, false) => format!("{label} (or set {env_hint})"),
        (None, true) => label.to_string(),
    };

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    Ok(if input.trim().is_empty() {
        current
    } else {
        Some(input.trim().to_string())
    })
}

fn provider_index(providers: &[&str], current: Option<&str>) -> usize {
    current
        .and_then(|c| providers.iter().position(|p| p.eq_ignore_ascii_case(c)))
        .unwrap_or(0)
}

/// Show only the ends of a key
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
