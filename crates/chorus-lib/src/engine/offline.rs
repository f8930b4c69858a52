//! Offline engine — local espeak-ng / espeak process, WAV output.
//!
//! espeak only writes WAV to a file sink, so each invocation gets its own
//! [`NamedTempFile`]. The file belongs to the invocation's future: it is
//! removed when synthesis finishes, fails, or is cancelled by a timeout. The
//! child process is killed on cancellation too (`kill_on_drop`).

use std::process::Stdio;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use chorus_core::audio::parse_wav_header;
use chorus_core::types::{AudioFormat, AudioResult, EngineKind, OfflineConfig};

use super::{EngineError, SpeechEngine};

/// A voice reported by `espeak --voices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EspeakVoice {
    /// Language code, also accepted by `-v`.
    pub language: String,
    /// `'M'`, `'F'`, or `'-'`.
    pub gender: char,
    pub name: String,
}

impl EspeakVoice {
    /// Name plus spelled-out gender, matched against the configured hints.
    fn descriptor(&self) -> String {
        let gender = match self.gender {
            'F' => " female woman",
            'M' => " male man",
            _ => "",
        };
        format!("{}{}", self.name, gender).to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct OfflineEngine {
    binary: String,
    config: OfflineConfig,
}

impl OfflineEngine {
    /// Create the engine, auto-detecting espeak-ng (preferred) or espeak
    /// unless a binary is configured.
    pub fn new(config: OfflineConfig) -> Self {
        let binary = config.binary.clone().unwrap_or_else(|| {
            if which::which("espeak-ng").is_ok() {
                "espeak-ng".to_string()
            } else {
                "espeak".to_string()
            }
        });
        Self { binary, config }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn list_voices(&self) -> Result<Vec<EspeakVoice>, EngineError> {
        let output = Command::new(&self.binary)
            .arg("--voices")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::Process {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_voices(&String::from_utf8_lossy(&output.stdout)))
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotInstalled {
                binary: self.binary.clone(),
            }
        } else {
            EngineError::Spawn {
                binary: self.binary.clone(),
                source: e,
            }
        }
    }
}

#[async_trait]
impl SpeechEngine for OfflineEngine {
    fn name(&self) -> &str {
        EngineKind::Offline.as_str()
    }

    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResult, EngineError> {
        let voices = self.list_voices().await?;
        let voice = select_voice(&voices, &self.config);

        let wav_file = tempfile::Builder::new()
            .prefix("chorus-")
            .suffix(".wav")
            .tempfile()?;

        debug!(
            "offline: {} voice={} -> {}",
            self.binary,
            voice.as_deref().unwrap_or("default"),
            wav_file.path().display()
        );

        let mut cmd = Command::new(&self.binary);
        if let Some(voice) = &voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-w")
            .arg(wav_file.path())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        // Text goes through stdin so input starting with '-' is never parsed
        // as a flag.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Task("stdin pipe unavailable".into()))?;
        stdin.write_all(text.as_bytes()).await?;
        // EOF
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(EngineError::Process {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = read_wav(wav_file).await?;
        Ok(AudioResult::new(bytes, AudioFormat::Wav))
    }

    async fn probe(&self) -> Result<(), EngineError> {
        which::which(&self.binary).map_err(|_| EngineError::NotInstalled {
            binary: self.binary.clone(),
        })?;
        self.list_voices().await.map(|_| ())
    }
}

/// Read back and validate the WAV espeak wrote. Consumes the temp file so it
/// is deleted before returning, whatever the outcome.
async fn read_wav(wav_file: NamedTempFile) -> Result<Vec<u8>, EngineError> {
    let bytes = tokio::fs::read(wav_file.path()).await;
    drop(wav_file);
    let bytes = bytes?;

    if bytes.is_empty() {
        return Err(EngineError::EmptyAudio);
    }
    parse_wav_header(&bytes).map_err(|e| EngineError::InvalidAudio(e.to_string()))?;
    Ok(bytes)
}

/// Pick the `-v` argument for this invocation.
///
/// Explicit voice, then the first voice matching a hint, then the voice at
/// the fallback index, then `None` (engine default).
pub fn select_voice(voices: &[EspeakVoice], config: &OfflineConfig) -> Option<String> {
    if let Some(voice) = &config.voice {
        return Some(voice.clone());
    }

    let hints: Vec<String> = config
        .voice_hints
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();

    voices
        .iter()
        .find(|v| {
            let descriptor = v.descriptor();
            hints.iter().any(|h| descriptor.contains(h.as_str()))
        })
        .or_else(|| voices.get(config.fallback_voice_index))
        .map(|v| v.language.clone())
}

/// Parse `espeak --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af                 --/M      Afrikaans          gmw/af
///  2  en-us              --/F      English_(America)  gmw/en-US
/// ```
///
/// Unparseable lines are skipped.
pub fn parse_voices(output: &str) -> Vec<EspeakVoice> {
    output.lines().filter_map(parse_voice_line).collect()
}

fn parse_voice_line(line: &str) -> Option<EspeakVoice> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }
    // Header line has "Pty" here
    parts[0].parse::<u32>().ok()?;

    let gender = parts[2]
        .rsplit('/')
        .next()
        .and_then(|g| g.chars().next())
        .filter(|g| matches!(g, 'M' | 'F'))
        .unwrap_or('-');

    Some(EspeakVoice {
        language: parts[1].to_string(),
        gender,
        name: parts[3].replace('_', " "),
    })
}
