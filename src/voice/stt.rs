//! Speech-to-text over HTTP (`OpenAI` Whisper or Deepgram)

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{SAMPLE_RATE, Transcriber, samples_to_wav};
use crate::{Config, Error, Result};

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    #[serde(default)]
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcription backend and its model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper (multipart upload)
    Whisper { model: String },
    /// Deepgram prerecorded audio (raw WAV body)
    Deepgram { model: String },
}

impl SttProvider {
    const fn label(&self) -> &'static str {
        match self {
            Self::Whisper { .. } => "whisper",
            Self::Deepgram { .. } => "deepgram",
        }
    }

    fn request(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        wav: Vec<u8>,
    ) -> Result<reqwest::RequestBuilder> {
        let request = match self {
            Self::Whisper { model } => {
                let file = reqwest::multipart::Part::bytes(wav)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", file)
                    .text("model", model.clone());

                client.post(WHISPER_URL).bearer_auth(api_key).multipart(form)
            }
            Self::Deepgram { model } => client
                .post(DEEPGRAM_URL)
                .query(&[("model", model.as_str()), ("punctuate", "true")])
                .header("Authorization", format!("Token {api_key}"))
                .header("Content-Type", "audio/wav")
                .body(wav),
        };
        Ok(request)
    }

    /// Pull the transcript out of a response body
    fn parse(&self, body: &str) -> Result<String> {
        let transcript = match self {
            Self::Whisper { .. } => serde_json::from_str::<WhisperResponse>(body)?.text,
            Self::Deepgram { .. } => serde_json::from_str::<DeepgramResponse>(body)?
                .results
                .channels
                .into_iter()
                .next()
                .and_then(|c| c.alternatives.into_iter().next())
                .map(|a| a.transcript)
                .unwrap_or_default(),
        };
        Ok(transcript)
    }
}

/// Transcribes utterances through a hosted STT service
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a transcriber for `provider`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the key is empty
    pub fn new(provider: SttProvider, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "an API key is required for {} transcription",
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
        let model = config.voice.stt_model.clone();
        let (provider, key) = match config.voice.stt_provider.as_str() {
            "whisper" => (SttProvider::Whisper { model }, &config.api_keys.openai),
            "deepgram" => (SttProvider::Deepgram { model }, &config.api_keys.deepgram),
            other => return Err(Error::Config(format!("unknown STT provider: {other}"))),
        };
        Self::new(provider, key.clone().unwrap_or_default())
    }

    /// Transcribe a WAV file
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` if the service is unreachable or rejects the
    /// request, and `Error::Unintelligible` if it heard nothing
    pub async fn transcribe_wav(&self, wav: Vec<u8>) -> Result<String> {
        let provider = self.provider.label();
        tracing::debug!(provider, bytes = wav.len(), "requesting transcription");

        let response = self
            .provider
            .request(&self.client, self.api_key.expose_secret(), wav)?
            .send()
            .await
            .map_err(|e| Error::Stt(format!("{provider} request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Stt(format!("{provider} response unreadable: {e}")))?;

        if !status.is_success() {
            tracing::warn!(provider, %status, body = %body, "transcription rejected");
            return Err(Error::Stt(format!("{provider} returned {status}")));
        }

        let transcript = self
            .provider
            .parse(&body)
            .map_err(|e| Error::Stt(format!("{provider} response malformed: {e}")))?;
        let transcript = transcript.trim();

        if transcript.is_empty() {
            return Err(Error::Unintelligible);
        }
        tracing::debug!(provider, transcript, "transcribed");
        Ok(transcript.to_string())
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        // Encoding failures are not device failures
        let wav = samples_to_wav(samples, SAMPLE_RATE).map_err(|e| Error::Stt(e.to_string()))?;
        self.transcribe_wav(wav).await
    }
}
