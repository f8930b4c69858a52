//! Neural engine — streaming OpenAI-compatible `/v1/audio/speech` service
//! (Kokoro-FastAPI, koko, OpenAI itself).
//!
//! The service streams MP3 with chunked transfer encoding. Chunks are
//! collected until the body ends; callers only ever see the complete buffer.

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use chorus_core::audio::sniff_format;
use chorus_core::types::{AudioFormat, AudioResult, EngineKind, NeuralConfig};

use super::{EngineError, SpeechEngine};

#[derive(Debug, Clone)]
pub struct NeuralEngine {
    client: reqwest::Client,
    config: NeuralConfig,
}

impl NeuralEngine {
    pub fn new(client: reqwest::Client, config: NeuralConfig) -> Self {
        Self { client, config }
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechEngine for NeuralEngine {
    fn name(&self) -> &str {
        EngineKind::Neural.as_str()
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResult, EngineError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": self.config.voice,
            "response_format": "mp3",
            "stream": true,
            "speed": self.config.speed,
        });

        let mut req = self.client.post(self.speech_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        debug!("neural: POST {} chars", text.chars().count());

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Status { status, body });
        }

        let mut stream = resp.bytes_stream();
        let mut audio = Vec::new();
        let mut chunks = 0usize;
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
            chunks += 1;
        }

        debug!("neural: {} bytes in {} chunks", audio.len(), chunks);

        if audio.is_empty() {
            return Err(EngineError::EmptyAudio);
        }
        if sniff_format(&audio) != Some(AudioFormat::Mp3) {
            return Err(EngineError::InvalidAudio("response is not MP3".into()));
        }
        Ok(AudioResult::new(audio, AudioFormat::Mp3))
    }

    async fn probe(&self) -> Result<(), EngineError> {
        // Any HTTP answer means the service is up.
        self.client.get(&self.config.url).send().await?;
        Ok(())
    }
}
