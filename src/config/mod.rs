//! Configuration management for the Nova assistant

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};
use file::NovaConfigFile;

/// Default trigger phrase
pub const DEFAULT_WAKE_WORD: &str = "nova";

/// Default assistant display name
pub const DEFAULT_NAME: &str = "NOVA";

/// Default fallback when no local music is found
pub const DEFAULT_MUSIC_URL: &str = "https://www.youtube.com/results?search_query=music";

/// Nova assistant configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Assistant identity and phrases
    pub assistant: AssistantConfig,

    /// Listening loop timings
    pub listener: ListenerConfig,

    /// Chat-completion configuration
    pub llm: LlmConfig,

    /// Translation configuration
    pub translation: TranslationConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Music command configuration
    pub music: MusicConfig,

    /// Weather command configuration, present only when fully configured
    pub weather: Option<WeatherConfig>,

    /// Question worker limits
    pub workers: WorkerConfig,

    /// API keys for speech services
    pub api_keys: ApiKeys,
}

/// Assistant identity and phrases
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Display name used as the reply prefix
    pub name: String,

    /// Trigger phrases
    pub wake_words: Vec<String>,

    /// Phrases that end a conversation
    pub exit_phrases: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            wake_words: vec![DEFAULT_WAKE_WORD.to_string()],
            exit_phrases: vec!["goodbye".to_string(), "bye".to_string()],
        }
    }
}

/// Listening loop timings
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Ambient noise sampling time after acquiring a stream
    pub calibration: Duration,

    /// Per-utterance cap while waiting for the wake word
    pub wake_phrase_limit: Duration,

    /// Per-utterance cap inside a conversation
    pub conversation_phrase_limit: Duration,

    /// Pause after a transcription service error
    pub stt_backoff: Duration,

    /// Pause before re-acquiring a failed audio device
    pub device_retry: Duration,

    /// Pause after an unexpected error in the utterance loop
    pub error_pause: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            calibration: Duration::from_secs(1),
            wake_phrase_limit: Duration::from_secs(8),
            conversation_phrase_limit: Duration::from_secs(5),
            stt_backoff: Duration::from_secs(1),
            device_retry: Duration::from_secs(2),
            error_pause: Duration::from_millis(100),
        }
    }
}

/// Chat-completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Reply token cap
    pub max_tokens: u32,

    /// Nucleus sampling value
    pub top_p: f32,

    /// Fixed seed for reproducible replies
    pub random_seed: u64,

    /// API key (`MISTRAL_API_KEY`)
    pub api_key: Option<SecretString>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mistral.ai".to_string(),
            model: "mistral-tiny".to_string(),
            temperature: 0.1,
            max_tokens: 100,
            top_p: 0.9,
            random_seed: 42,
            api_key: None,
        }
    }
}

/// Translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Translation endpoint
    pub endpoint: String,

    /// Target language code
    pub target: String,

    /// Number of memoized translations
    pub cache_capacity: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            target: "en".to_string(),
            cache_capacity: 100,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speak replies aloud
    pub enabled: bool,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: String,

    /// STT model
    pub stt_model: String,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_provider: "whisper".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_provider: "openai".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "onyx".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// Music command configuration
#[derive(Debug, Clone)]
pub struct MusicConfig {
    /// Directory scanned for playable files
    pub directory: PathBuf,

    /// Playable file extensions, lower-case without dot
    pub extensions: Vec<String>,

    /// Page opened when no local file is found
    pub fallback_url: String,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            directory: default_music_dir(),
            extensions: vec!["mp3".to_string(), "wav".to_string()],
            fallback_url: DEFAULT_MUSIC_URL.to_string(),
        }
    }
}

/// Default music directory: the platform audio dir, else `~/Music`
fn default_music_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from("Music"),
        |d| {
            d.audio_dir()
                .map_or_else(|| d.home_dir().join("Music"), std::path::Path::to_path_buf)
        },
    )
}

/// Weather command configuration
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// `OpenWeatherMap` API key
    pub api_key: String,

    /// City to report on
    pub city: String,
}

/// Question worker limits
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrently running question workers
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// API keys for speech services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from the environment and the config file
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Priority is env > toml > default.
    pub fn from_sources<F>(fc: NovaConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Assistant
        let wake_words = env("NOVA_WAKE_WORD")
            .map(|w| vec![w])
            .or(fc.assistant.wake_words)
            .unwrap_or(defaults.assistant.wake_words);
        let assistant = AssistantConfig {
            name: fc.assistant.name.unwrap_or(defaults.assistant.name),
            wake_words,
            exit_phrases: fc
                .assistant
                .exit_phrases
                .unwrap_or(defaults.assistant.exit_phrases),
        };

        // Listener timings (toml > default)
        let ms = Duration::from_millis;
        let listener = ListenerConfig {
            calibration: fc
                .listener
                .calibration_ms
                .map_or(defaults.listener.calibration, ms),
            wake_phrase_limit: fc
                .listener
                .wake_phrase_limit_ms
                .map_or(defaults.listener.wake_phrase_limit, ms),
            conversation_phrase_limit: fc
                .listener
                .conversation_phrase_limit_ms
                .map_or(defaults.listener.conversation_phrase_limit, ms),
            stt_backoff: fc
                .listener
                .stt_backoff_ms
                .map_or(defaults.listener.stt_backoff, ms),
            device_retry: fc
                .listener
                .device_retry_ms
                .map_or(defaults.listener.device_retry, ms),
            error_pause: defaults.listener.error_pause,
        };

        // Chat completion (env > toml > default)
        let llm = LlmConfig {
            base_url: env("NOVA_LLM_URL")
                .or(fc.llm.base_url)
                .unwrap_or(defaults.llm.base_url),
            model: env("NOVA_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.llm.model),
            temperature: fc.llm.temperature.unwrap_or(defaults.llm.temperature),
            max_tokens: fc.llm.max_tokens.unwrap_or(defaults.llm.max_tokens),
            top_p: fc.llm.top_p.unwrap_or(defaults.llm.top_p),
            random_seed: fc.llm.random_seed.unwrap_or(defaults.llm.random_seed),
            api_key: env("MISTRAL_API_KEY")
                .or(fc.api_keys.mistral)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let translation = TranslationConfig {
            endpoint: fc
                .translation
                .endpoint
                .unwrap_or(defaults.translation.endpoint),
            target: fc.translation.target.unwrap_or(defaults.translation.target),
            cache_capacity: fc
                .translation
                .cache_capacity
                .unwrap_or(defaults.translation.cache_capacity),
        };

        let voice = VoiceConfig {
            enabled: fc.voice.enabled.unwrap_or(defaults.voice.enabled),
            stt_provider: fc
                .voice
                .stt_provider
                .unwrap_or(defaults.voice.stt_provider),
            stt_model: env("NOVA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.voice.stt_model),
            tts_provider: fc
                .voice
                .tts_provider
                .unwrap_or(defaults.voice.tts_provider),
            tts_model: env("NOVA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.voice.tts_model),
            tts_voice: env("NOVA_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.voice.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
        };

        let music = MusicConfig {
            directory: env("NOVA_MUSIC_DIR")
                .or(fc.music.directory)
                .map_or(defaults.music.directory, PathBuf::from),
            extensions: fc
                .music
                .extensions
                .map(|exts| {
                    exts.into_iter()
                        .map(|e| e.trim_start_matches('.').to_lowercase())
                        .collect()
                })
                .unwrap_or(defaults.music.extensions),
            fallback_url: fc.music.fallback_url.unwrap_or(defaults.music.fallback_url),
        };

        // Weather is only enabled when both key and city are known
        let weather_key = env("OPENWEATHER_API_KEY").or(fc.api_keys.openweather);
        let weather_city = env("NOVA_WEATHER_CITY").or(fc.weather.city);
        let weather = match (weather_key, weather_city) {
            (Some(api_key), Some(city)) if !api_key.is_empty() && !city.is_empty() => {
                Some(WeatherConfig { api_key, city })
            }
            _ => None,
        };

        let workers = WorkerConfig {
            max_concurrent: fc
                .workers
                .max_concurrent
                .filter(|n| *n > 0)
                .unwrap_or(defaults.workers.max_concurrent),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        Self {
            assistant,
            listener,
            llm,
            translation,
            voice,
            music,
            weather,
            workers,
            api_keys,
        }
    }

    /// Chat-completion API key, required to answer questions
    ///
    /// # Errors
    ///
    /// Returns error if `MISTRAL_API_KEY` is not set
    pub fn llm_api_key(&self) -> Result<&SecretString> {
        self.llm
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("MISTRAL_API_KEY is required".to_string()))
    }
}
