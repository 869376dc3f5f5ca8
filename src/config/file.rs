//! TOML configuration file loading
//!
//! Supports `~/.config/nova/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NovaConfigFile {
    /// Assistant identity and phrases
    #[serde(default, skip_serializing_if = "is_default")]
    pub assistant: AssistantFileConfig,

    /// Listening loop timings
    #[serde(default, skip_serializing_if = "is_default")]
    pub listener: ListenerFileConfig,

    /// Chat-completion configuration
    #[serde(default, skip_serializing_if = "is_default")]
    pub llm: LlmFileConfig,

    /// Translation configuration
    #[serde(default, skip_serializing_if = "is_default")]
    pub translation: TranslationFileConfig,

    /// Voice/audio configuration
    #[serde(default, skip_serializing_if = "is_default")]
    pub voice: VoiceFileConfig,

    /// Music command configuration
    #[serde(default, skip_serializing_if = "is_default")]
    pub music: MusicFileConfig,

    /// Weather command configuration
    #[serde(default, skip_serializing_if = "is_default")]
    pub weather: WeatherFileConfig,

    /// Question worker limits
    #[serde(default, skip_serializing_if = "is_default")]
    pub workers: WorkersFileConfig,

    /// API keys for external services
    #[serde(default, skip_serializing_if = "is_default")]
    pub api_keys: ApiKeysFileConfig,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Assistant identity
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantFileConfig {
    /// Display name used for replies (e.g. "NOVA")
    pub name: Option<String>,

    /// Trigger phrases
    pub wake_words: Option<Vec<String>>,

    /// Phrases that end a conversation
    pub exit_phrases: Option<Vec<String>>,
}

/// Listening loop timings, all in milliseconds
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerFileConfig {
    pub calibration_ms: Option<u64>,
    pub wake_phrase_limit_ms: Option<u64>,
    pub conversation_phrase_limit_ms: Option<u64>,
    pub stt_backoff_ms: Option<u64>,
    pub device_retry_ms: Option<u64>,
}

/// Chat-completion configuration
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmFileConfig {
    /// API base URL (e.g. `https://api.mistral.ai`)
    pub base_url: Option<String>,

    /// Model identifier (e.g. "mistral-tiny")
    pub model: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub random_seed: Option<u64>,
}

/// Translation configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationFileConfig {
    pub endpoint: Option<String>,

    /// Target language code (e.g. "en")
    pub target: Option<String>,

    /// Number of memoized translations to keep
    pub cache_capacity: Option<usize>,
}

/// Voice processing configuration
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceFileConfig {
    /// Speak replies aloud
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "onyx")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// Music command configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicFileConfig {
    pub directory: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub fallback_url: Option<String>,
}

/// Weather command configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherFileConfig {
    pub city: Option<String>,
}

/// Question worker limits
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkersFileConfig {
    pub max_concurrent: Option<usize>,
}

/// API keys configuration
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeysFileConfig {
    pub mistral: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub openweather: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `NovaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> NovaConfigFile {
    let Some(path) = config_file_path() else {
        return NovaConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> NovaConfigFile {
    if !path.exists() {
        return NovaConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                NovaConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            NovaConfigFile::default()
        }
    }
}

/// Write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn write_config_file(path: &Path, config: &NovaConfigFile) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("failed to serialize config: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;

    tracing::info!(path = %path.display(), "wrote config file");
    Ok(())
}

/// Return the config file path: `~/.config/nova/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("nova").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let content = r#"
            [assistant]
            wake_words = ["hey nova"]

            [llm]
            model = "mistral-small"
            temperature = 0.3
        "#;

        let fc: NovaConfigFile = toml::from_str(content).unwrap();
        assert_eq!(fc.assistant.wake_words, Some(vec!["hey nova".to_string()]));
        assert_eq!(fc.llm.model.as_deref(), Some("mistral-small"));
        assert_eq!(fc.llm.max_tokens, None);
        assert_eq!(fc.music, MusicFileConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let fc = load_config_file_from(&dir.path().join("absent.toml"));
        assert!(fc.assistant.name.is_none());
    }

    #[test]
    fn test_unparsable_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        let fc = load_config_file_from(&path);
        assert!(fc.llm.model.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut fc = NovaConfigFile::default();
        fc.music.directory = Some("/srv/music".to_string());
        write_config_file(&path, &fc).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[music]"));
        assert!(!written.contains("[llm]"));

        let loaded = load_config_file_from(&path);
        assert_eq!(loaded.music.directory.as_deref(), Some("/srv/music"));
    }
}
