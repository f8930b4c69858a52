//! Shared types for the chorus speech relay.
//!
//! Kept free of tokio and reqwest so the CLI and downstream consumers can
//! depend on the data model without pulling in the engine stack.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::text_prep::MAX_TEXT_CHARS;

// ─── Audio ─────────────────────────────────────────────────────────────────

/// Container format of the bytes an engine produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Audio produced by a single successful engine invocation.
///
/// Owned by the request that produced it and dropped once the response has
/// been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioResult {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioResult {
    pub fn new(bytes: Vec<u8>, format: AudioFormat) -> Self {
        Self { bytes, format }
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Filename offered to the client, e.g. `speech.wav`.
    pub fn suggested_filename(&self) -> String {
        format!("speech.{}", self.format.extension())
    }
}

// ─── Outcome ───────────────────────────────────────────────────────────────

/// One engine's recorded failure within a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineFailure {
    pub engine: String,
    pub reason: String,
}

/// Result of running text through the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    /// The first engine that produced audio. Later engines were not tried.
    Success { engine: String, audio: AudioResult },
    /// Every engine failed. `failures` follows the order of the chain and
    /// `text` is what the engines were given (after truncation).
    Unavailable {
        text: String,
        failures: Vec<EngineFailure>,
    },
}

impl SynthesisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ─── Status ────────────────────────────────────────────────────────────────

/// Availability snapshot of the configured engines, in chain order.
///
/// Serializes as `{"<engine>": bool, ..., "available_engines": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub engines: Vec<(String, bool)>,
}

impl StatusReport {
    pub fn available_engines(&self) -> Vec<&str> {
        self.engines
            .iter()
            .filter(|(_, up)| *up)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl Serialize for StatusReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.engines.len() + 1))?;
        for (name, up) in &self.engines {
            map.serialize_entry(name, up)?;
        }
        map.serialize_entry("available_engines", &self.available_engines())?;
        map.end()
    }
}

// ─── Configuration ─────────────────────────────────────────────────────────

/// The engines chorus knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Local espeak-ng / espeak process, WAV output.
    Offline,
    /// Streaming OpenAI-compatible speech service, MP3 output.
    Neural,
    /// Google Translate TTS endpoint, MP3 output.
    Gtts,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [Self::Offline, Self::Neural, Self::Gtts];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Neural => "neural",
            Self::Gtts => "gtts",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" | "espeak" | "espeak-ng" => Ok(Self::Offline),
            "neural" | "kokoro" => Ok(Self::Neural),
            "gtts" | "google" => Ok(Self::Gtts),
            other => Err(format!(
                "unknown engine '{other}'; valid engines: offline, neural, gtts"
            )),
        }
    }
}

/// Fallback chain policy.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Engines in priority order.
    pub engines: Vec<EngineKind>,
    /// Upper bound on a single engine attempt.
    pub attempt_timeout: Duration,
    /// Upper bound on the whole chain. Engines reached after it has passed
    /// are recorded as failed without being invoked.
    pub chain_deadline: Duration,
    /// Upper bound on a single liveness probe.
    pub probe_timeout: Duration,
    /// Longer input is truncated to this many characters.
    pub max_text_chars: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            engines: EngineKind::ALL.to_vec(),
            attempt_timeout: Duration::from_secs(6),
            chain_deadline: Duration::from_secs(14),
            probe_timeout: Duration::from_secs(3),
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

/// Offline engine configuration.
///
/// Voice selection order: `voice` if set, then the first listed voice whose
/// name matches one of `voice_hints`, then the voice at
/// `fallback_voice_index`, then the engine default.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Binary to run. `None` auto-detects espeak-ng, then espeak.
    pub binary: Option<String>,
    pub voice: Option<String>,
    pub voice_hints: Vec<String>,
    pub fallback_voice_index: usize,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            binary: None,
            voice: None,
            voice_hints: vec!["female".into(), "woman".into()],
            fallback_voice_index: 1,
        }
    }
}

/// Neural engine configuration (OpenAI-compatible `/v1/audio/speech`).
#[derive(Debug, Clone)]
pub struct NeuralConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub speed: f32,
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8880".into(),
            api_key: None,
            model: "kokoro".into(),
            voice: "af_heart".into(),
            speed: 1.0,
        }
    }
}

/// Google Translate TTS engine configuration.
#[derive(Debug, Clone)]
pub struct GttsConfig {
    pub url: String,
    pub lang: String,
    /// The endpoint rejects long inputs, so text is requested in pieces.
    pub chunk_len: usize,
}

impl Default for GttsConfig {
    fn default() -> Self {
        Self {
            url: "https://translate.google.com".into(),
            lang: "en".into(),
            chunk_len: 100,
        }
    }
}

/// Everything needed to build the engine chain and serve it.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub chain: ChainConfig,
    pub offline: OfflineConfig,
    pub neural: NeuralConfig,
    pub gtts: GttsConfig,
    /// Spell out symbols and strip markup before synthesis.
    pub clean_text: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_result_naming() {
        let wav = AudioResult::new(vec![1, 2, 3], AudioFormat::Wav);
        assert_eq!(wav.mime_type(), "audio/wav");
        assert_eq!(wav.suggested_filename(), "speech.wav");

        let mp3 = AudioResult::new(vec![], AudioFormat::Mp3);
        assert_eq!(mp3.mime_type(), "audio/mpeg");
        assert_eq!(mp3.suggested_filename(), "speech.mp3");
    }

    #[test]
    fn status_report_serializes_flat() {
        let report = StatusReport {
            engines: vec![
                ("offline".into(), false),
                ("neural".into(), true),
                ("gtts".into(), true),
            ],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["offline"], false);
        assert_eq!(value["neural"], true);
        assert_eq!(value["gtts"], true);
        assert_eq!(value["available_engines"], serde_json::json!(["neural", "gtts"]));
    }

    #[test]
    fn status_report_empty() {
        let value = serde_json::to_value(StatusReport::default()).unwrap();
        assert_eq!(value, serde_json::json!({ "available_engines": [] }));
    }

    #[test]
    fn engine_kind_parse() {
        assert_eq!("offline".parse::<EngineKind>(), Ok(EngineKind::Offline));
        assert_eq!(" Neural ".parse::<EngineKind>(), Ok(EngineKind::Neural));
        assert_eq!("espeak-ng".parse::<EngineKind>(), Ok(EngineKind::Offline));
        assert_eq!("google".parse::<EngineKind>(), Ok(EngineKind::Gtts));
        assert!("piper".parse::<EngineKind>().is_err());
    }

    #[test]
    fn engine_kind_roundtrips_through_name() {
        for kind in EngineKind::ALL {
            assert_eq!(kind.as_str().parse::<EngineKind>(), Ok(kind));
        }
    }

    #[test]
    fn default_chain_covers_all_engines() {
        let config = ChainConfig::default();
        assert_eq!(config.engines, EngineKind::ALL.to_vec());
        assert_eq!(config.max_text_chars, 500);
    }

    #[test]
    fn default_chain_finishes_before_browser_gives_up() {
        // Browser clients abort the request after 15 s.
        let config = ChainConfig::default();
        assert!(config.chain_deadline < Duration::from_secs(15));
        assert!(config.attempt_timeout <= config.chain_deadline);
    }
}
