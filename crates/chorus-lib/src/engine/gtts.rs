//! Google Translate TTS engine — MP3 into an in-memory buffer.
//!
//! The `translate_tts` endpoint rejects long input, so text is requested in
//! chunks of at most [`GttsConfig::chunk_len`] characters and the MP3 bodies
//! are concatenated (MPEG frames are self-delimiting).

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use tracing::debug;

use chorus_core::text_prep::split_text;
use chorus_core::types::{AudioFormat, AudioResult, EngineKind, GttsConfig};

use super::{EngineError, SpeechEngine};

/// The endpoint refuses requests without a browser-like user agent.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct GttsEngine {
    client: reqwest::Client,
    config: GttsConfig,
}

impl GttsEngine {
    pub fn new(client: reqwest::Client, config: GttsConfig) -> Self {
        Self { client, config }
    }

    fn tts_url(&self) -> String {
        format!("{}/translate_tts", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechEngine for GttsEngine {
    fn name(&self) -> &str {
        EngineKind::Gtts.as_str()
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResult, EngineError> {
        let chunks = split_text(text.trim(), self.config.chunk_len);
        let total = chunks.len().to_string();
        let url = self.tts_url();
        let mut audio = Vec::new();

        debug!("gtts: {} chunk(s), lang={}", chunks.len(), self.config.lang);

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let resp = self
                .client
                .get(&url)
                .header(USER_AGENT, BROWSER_UA)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.config.lang.as_str()),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                return Err(EngineError::Status { status, body });
            }

            let bytes = resp.bytes().await?;
            if bytes.is_empty() {
                return Err(EngineError::EmptyAudio);
            }
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(EngineError::EmptyAudio);
        }
        Ok(AudioResult::new(audio, AudioFormat::Mp3))
    }

    async fn probe(&self) -> Result<(), EngineError> {
        self.client
            .get(&self.config.url)
            .header(USER_AGENT, BROWSER_UA)
            .send()
            .await?;
        Ok(())
    }
}
