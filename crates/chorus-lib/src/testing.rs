//! Scriptable engine for orchestrator and router tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use chorus_core::types::{AudioFormat, AudioResult};

use crate::engine::{EngineError, SpeechEngine};

pub(crate) enum Behavior {
    Succeed(Vec<u8>, AudioFormat),
    Fail(&'static str),
    Hang,
    Panic,
}

/// Records every invocation so tests can assert who was called with what.
pub(crate) struct MockEngine {
    name: String,
    behavior: Behavior,
    probe_ok: bool,
    probe_hangs: bool,
    pub synth_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            probe_ok: true,
            probe_hangs: false,
            synth_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(name: &str, bytes: &[u8], format: AudioFormat) -> Self {
        Self::new(name, Behavior::Succeed(bytes.to_vec(), format))
    }

    pub fn failing(name: &str, reason: &'static str) -> Self {
        Self::new(name, Behavior::Fail(reason))
    }

    pub fn with_probe(mut self, ok: bool) -> Self {
        self.probe_ok = ok;
        self
    }

    /// Probe never returns, like a service that accepts the connection
    /// and then goes silent.
    pub fn with_hanging_probe(mut self) -> Self {
        self.probe_hangs = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> AudioFormat {
        match &self.behavior {
            Behavior::Succeed(_, format) => *format,
            _ => AudioFormat::Wav,
        }
    }

    async fn synthesize(&self, text: &str) -> Result<AudioResult, EngineError> {
        self.synth_calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        match &self.behavior {
            Behavior::Succeed(bytes, format) => Ok(AudioResult::new(bytes.clone(), *format)),
            Behavior::Fail(reason) => Err(EngineError::Task((*reason).to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::EmptyAudio)
            }
            Behavior::Panic => panic!("mock engine exploded"),
        }
    }

    async fn probe(&self) -> Result<(), EngineError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.probe_ok {
            Ok(())
        } else {
            Err(EngineError::NotInstalled {
                binary: self.name.clone(),
            })
        }
    }
}
