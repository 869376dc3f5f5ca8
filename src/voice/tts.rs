//! Text-to-speech over HTTP (`OpenAI` or `ElevenLabs`), returning MP3

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::{Config, Error, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// Synthesis backend with its voice settings
#[derive(Debug, Clone, PartialEq)]
pub enum TtsProvider {
    /// `OpenAI` speech endpoint
    OpenAi {
        model: String,
        voice: String,
        /// Playback speed, clamped to the API's 0.25..=4.0
        speed: f32,
    },
    /// `ElevenLabs` voice by id
    ElevenLabs { model: String, voice_id: String },
}

impl TtsProvider {
    const fn label(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::ElevenLabs { .. } => "elevenlabs",
        }
    }

    fn url(&self) -> String {
        match self {
            Self::OpenAi { .. } => OPENAI_SPEECH_URL.to_string(),
            Self::ElevenLabs { voice_id, .. } => format!("{ELEVENLABS_URL}/{voice_id}"),
        }
    }

    fn body(&self, text: &str) -> Value {
        match self {
            Self::OpenAi {
                model,
                voice,
                speed,
            } => json!({
                "model": model,
                "input": text,
                "voice": voice,
                "speed": speed.clamp(0.25, 4.0),
                "response_format": "mp3",
            }),
            Self::ElevenLabs { model, .. } => json!({
                "text": text,
                "model_id": model,
            }),
        }
    }
}

/// Synthesizes replies through a hosted TTS service
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a synthesizer for `provider`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the key is empty
    pub fn new(provider: TtsProvider, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "an API key is required for {} speech",
                provider.label()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key),
            provider,
        })
    }

    /// Create the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or its key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let voice = &config.voice;
        let (provider, key) = match voice.tts_provider.as_str() {
            "openai" => (
                TtsProvider::OpenAi {
                    model: voice.tts_model.clone(),
                    voice: voice.tts_voice.clone(),
                    speed: voice.tts_speed,
                },
                &config.api_keys.openai,
            ),
            "elevenlabs" => (
                TtsProvider::ElevenLabs {
                    model: voice.tts_model.clone(),
                    voice_id: voice.tts_voice.clone(),
                },
                &config.api_keys.elevenlabs,
            ),
            other => return Err(Error::Config(format!("unknown TTS provider: {other}"))),
        };
        Self::new(provider, key.clone().unwrap_or_default())
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if the service rejects the request
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let provider = self.provider.label();
        let key = self.api_key.expose_secret();

        let request = self.client.post(self.provider.url());
        let request = match self.provider {
            TtsProvider::OpenAi { .. } => request.bearer_auth(key),
            TtsProvider::ElevenLabs { .. } => request
                .header("xi-api-key", key)
                .header("Accept", "audio/mpeg"),
        };

        let response = request.json(&self.provider.body(text)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider, %status, body = %body, "synthesis rejected");
            return Err(Error::Tts(format!("{provider} returned {status}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(provider, bytes = audio.len(), chars = text.len(), "synthesized");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_body_clamps_speed() {
        let provider = TtsProvider::OpenAi {
            model: "tts-1".to_string(),
            voice: "onyx".to_string(),
            speed: 10.0,
        };
        let body = provider.body("Time's up!");

        assert_eq!(body["input"], "Time's up!");
        assert_eq!(body["voice"], "onyx");
        assert_eq!(body["speed"], 4.0);
        assert_eq!(body["response_format"], "mp3");
        assert_eq!(provider.url(), OPENAI_SPEECH_URL);
    }

    #[test]
    fn test_elevenlabs_voice_in_url() {
        let provider = TtsProvider::ElevenLabs {
            model: "eleven_turbo_v2".to_string(),
            voice_id: "abc123".to_string(),
        };

        assert!(provider.url().ends_with("/text-to-speech/abc123"));
        assert_eq!(provider.body("hi")["model_id"], "eleven_turbo_v2");
    }

    #[test]
    fn test_missing_key_rejected() {
        let provider = TtsProvider::ElevenLabs {
            model: "m".to_string(),
            voice_id: "v".to_string(),
        };
        assert!(TextToSpeech::new(provider, String::new()).is_err());
    }

    #[test]
    fn test_from_config_defaults_to_openai() {
        let mut config = Config::default();
        config.api_keys.openai = Some("sk-test".to_string());

        let tts = TextToSpeech::from_config(&config).unwrap();
        assert!(matches!(tts.provider, TtsProvider::OpenAi { .. }));
    }
}
