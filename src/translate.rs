//! Translation into the assistant's canonical language
//!
//! Questions may be spoken in any language; they are translated before
//! they reach the answer service. Translation never fails from the
//! caller's point of view: on any error the input comes back unchanged.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::config::TranslationConfig;
use crate::{Error, Result};

/// Translates free text into a fixed target language
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text`, returning it unchanged if translation fails
    async fn translate(&self, text: &str) -> String;
}

/// Translator backed by the public Google Translate endpoint
pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
    target: String,
}

impl GoogleTranslator {
    /// Create a translator for the configured endpoint and target language
    #[must_use]
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            target: config.target.clone(),
        }
    }

    async fn request(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Translation(format!("service returned {status}")));
        }

        let body: serde_json::Value = response.json().await?;
        parse_translation(&body)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        match self.request(text).await {
            Ok(translated) => {
                tracing::debug!(from = text, to = %translated, "translated");
                translated
            }
            Err(e) => {
                tracing::warn!(error = %e, "translation failed, using original text");
                text.to_string()
            }
        }
    }
}

/// Join the translated segments of a `translate_a/single` response
///
/// The payload is a nested array whose first element lists
/// `[translated, original, ...]` segments.
fn parse_translation(body: &serde_json::Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::Translation("unexpected response shape".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|s| s.get(0).and_then(serde_json::Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(Error::Translation("empty translation".to_string()));
    }

    Ok(translated)
}

/// Memoizes another translator in a bounded LRU cache
pub struct CachedTranslator {
    inner: Box<dyn Translator>,
    cache: Mutex<LruCache<String, String>>,
}

impl CachedTranslator {
    /// Wrap `inner`, keeping at most `capacity` translations (minimum 1)
    #[must_use]
    pub fn new(inner: Box<dyn Translator>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Google-backed translator with the configured cache size
    #[must_use]
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(
            Box::new(GoogleTranslator::new(config)),
            config.cache_capacity,
        )
    }

    /// Number of cached translations
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Whether nothing has been cached yet
    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}

#[async_trait]
impl Translator for CachedTranslator {
    async fn translate(&self, text: &str) -> String {
        if let Some(hit) = self.cache.lock().await.get(text) {
            tracing::trace!(text, "translation cache hit");
            return hit.clone();
        }

        // Lock is released while the inner call runs; a concurrent miss on
        // the same text just translates twice
        let translated = self.inner.translate(text).await;
        self.cache
            .lock()
            .await
            .put(text.to_string(), translated.clone());
        translated
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingTranslator {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, text: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("en:{text}")
        }
    }

    fn counting(capacity: usize) -> (CachedTranslator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = CountingTranslator {
            calls: Arc::clone(&calls),
        };
        (CachedTranslator::new(Box::new(inner), capacity), calls)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner() {
        let (translator, calls) = counting(100);

        let first = translator.translate("quelle est la capitale").await;
        let second = translator.translate("quelle est la capitale").await;

        assert_eq!(first, second);
        assert_eq!(first, "en:quelle est la capitale");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(translator.len().await, 1);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recent() {
        let (translator, calls) = counting(2);

        translator.translate("a").await;
        translator.translate("b").await;
        translator.translate("c").await;
        translator.translate("a").await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(translator.len().await, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_still_caches() {
        let (translator, calls) = counting(0);

        translator.translate("x").await;
        translator.translate("x").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_translation_joins_segments() {
        let body = serde_json::json!([
            [
                ["What is ", "Quelle est ", null],
                ["the capital?", "la capitale?", null]
            ],
            null,
            "fr"
        ]);
        assert_eq!(parse_translation(&body).unwrap(), "What is the capital?");
    }

    #[test]
    fn test_parse_translation_rejects_bad_shape() {
        assert!(parse_translation(&serde_json::json!({"error": 1})).is_err());
        assert!(parse_translation(&serde_json::json!([[]])).is_err());
    }
}
