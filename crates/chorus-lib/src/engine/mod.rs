//! Speech engines — independent synthesis backends behind one trait.
//!
//! Every engine turns text into a complete audio buffer or a typed failure.
//! Engines never decide what happens after they fail; the
//! [`Orchestrator`](crate::orchestrator::Orchestrator) does.

pub mod gtts;
pub mod neural;
pub mod offline;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tracing::info;

use chorus_core::types::{AudioFormat, AudioResult, EngineKind, ServiceConfig};

pub use gtts::GttsEngine;
pub use neural::NeuralEngine;
pub use offline::OfflineEngine;

/// A synthesis backend.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Stable name used in logs, status reports, and the `X-TTS-Engine` header.
    fn name(&self) -> &str;

    /// Format of the audio this engine produces.
    fn format(&self) -> AudioFormat;

    /// Synthesize `text` into a complete audio buffer.
    async fn synthesize(&self, text: &str) -> Result<AudioResult, EngineError>;

    /// Cheap liveness check. Must not synthesize speech.
    async fn probe(&self) -> Result<(), EngineError>;
}

/// Why a single engine invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{binary} is not installed")]
    NotInstalled { binary: String },

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} exited with {status}: {stderr}")]
    Process {
        binary: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("engine returned no audio")]
    EmptyAudio,

    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("skipped, chain deadline of {0:?} already passed")]
    DeadlineExceeded(Duration),

    #[error("engine task failed: {0}")]
    Task(String),

    #[error("engine not configured")]
    NotConfigured,
}

/// Build the configured engines in chain order.
///
/// Called once at startup; the returned list is never mutated.
pub fn build_engines(config: &ServiceConfig) -> Vec<Arc<dyn SpeechEngine>> {
    let client = reqwest::Client::new();
    let mut engines: Vec<Arc<dyn SpeechEngine>> = Vec::new();

    for kind in &config.chain.engines {
        if engines.iter().any(|e| e.name() == kind.as_str()) {
            continue;
        }
        let engine: Arc<dyn SpeechEngine> = match kind {
            EngineKind::Offline => {
                let offline = OfflineEngine::new(config.offline.clone());
                info!("offline: using {}", offline.binary());
                Arc::new(offline)
            }
            EngineKind::Neural => {
                Arc::new(NeuralEngine::new(client.clone(), config.neural.clone()))
            }
            EngineKind::Gtts => Arc::new(GttsEngine::new(client.clone(), config.gtts.clone())),
        };
        engines.push(engine);
    }
    engines
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run an engine call on its own task.
///
/// The task lives exactly as long as the returned future: dropping it (for
/// example when a timeout fires) aborts the task, which drops the engine's
/// in-flight state. A panicking engine becomes an [`EngineError::Task`].
pub(crate) async fn isolated<T, F>(fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(fut);
    let _guard = AbortOnDrop(handle.abort_handle());
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(EngineError::Task("engine panicked".into())),
        Err(e) => Err(EngineError::Task(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::types::ChainConfig;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn builds_engines_in_configured_order() {
        let config = ServiceConfig {
            chain: ChainConfig {
                engines: vec![EngineKind::Gtts, EngineKind::Offline, EngineKind::Neural],
                ..Default::default()
            },
            ..Default::default()
        };
        let engines = build_engines(&config);
        let names: Vec<_> = engines.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["gtts", "offline", "neural"]);
    }

    #[test]
    fn skips_duplicate_engines() {
        let config = ServiceConfig {
            chain: ChainConfig {
                engines: vec![EngineKind::Neural, EngineKind::Neural, EngineKind::Gtts],
                ..Default::default()
            },
            ..Default::default()
        };
        let names: Vec<_> = build_engines(&config)
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["neural", "gtts"]);
    }

    #[test]
    fn engine_formats() {
        let engines = build_engines(&ServiceConfig::default());
        let formats: Vec<_> = engines.iter().map(|e| e.format()).collect();
        assert_eq!(formats, vec![AudioFormat::Wav, AudioFormat::Mp3, AudioFormat::Mp3]);
    }

    #[tokio::test]
    async fn isolated_returns_task_result() {
        let result = isolated(async { Ok::<_, EngineError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn isolated_converts_panic() {
        let explode = true;
        let result = isolated(async move {
            if explode {
                panic!("boom");
            }
            Ok::<(), EngineError>(())
        })
        .await;
        assert!(matches!(result, Err(EngineError::Task(_))));
    }

    #[tokio::test]
    async fn dropping_isolated_aborts_task() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = SetOnDrop(dropped.clone());
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            isolated(async move {
                let _flag = flag;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, EngineError>(())
            }),
        )
        .await;
        assert!(result.is_err());

        // Abort is processed on the next poll of the runtime.
        for _ in 0..50 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }
}
