//! Fallback chain — try engines in priority order, stop at the first success.
//!
//! ```text
//! synthesize("text")
//!     → prepare_text: reject blank, truncate to max_text_chars
//!     → engine[0]  (own task, attempt_timeout)  ── Ok  → Success
//!                                                └─ Err → record, next
//!     → engine[1]  ...
//!     → all failed → Unavailable { text, failures }
//! ```
//!
//! The whole chain shares one `chain_deadline`. Each attempt gets the
//! smaller of `attempt_timeout` and the time left; engines reached after
//! the deadline are recorded as skipped.
//!
//! An engine failure is never a request failure. Only validation errors
//! escape as `Err`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use chorus_core::error::ValidationError;
use chorus_core::text_prep::prepare_text;
use chorus_core::types::{
    AudioResult, ChainConfig, EngineFailure, StatusReport, SynthesisOutcome,
};

use crate::engine::{isolated, EngineError, SpeechEngine};

/// Owns the engine list for the lifetime of the service. Cheap to share
/// behind an `Arc`; holds no mutable state.
pub struct Orchestrator {
    engines: Vec<Arc<dyn SpeechEngine>>,
    attempt_timeout: Duration,
    chain_deadline: Duration,
    probe_timeout: Duration,
    max_text_chars: usize,
}

impl Orchestrator {
    pub fn new(engines: Vec<Arc<dyn SpeechEngine>>, config: &ChainConfig) -> Self {
        Self {
            engines,
            attempt_timeout: config.attempt_timeout,
            chain_deadline: config.chain_deadline,
            probe_timeout: config.probe_timeout,
            max_text_chars: config.max_text_chars,
        }
    }

    /// Engine names in chain order.
    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Input longer than this is truncated before any engine sees it.
    pub fn max_text_chars(&self) -> usize {
        self.max_text_chars
    }

    /// Run the full chain.
    pub async fn synthesize(&self, text: &str) -> Result<SynthesisOutcome, ValidationError> {
        self.run_chain(text, &self.engines).await
    }

    /// Run a chain of exactly one engine, looked up by name.
    pub async fn synthesize_with(
        &self,
        engine: &str,
        text: &str,
    ) -> Result<SynthesisOutcome, ValidationError> {
        match self.engines.iter().find(|e| e.name() == engine) {
            Some(found) => self.run_chain(text, std::slice::from_ref(found)).await,
            None => {
                let prepared = prepare_text(text, self.max_text_chars)?;
                Ok(SynthesisOutcome::Unavailable {
                    text: prepared.text,
                    failures: vec![EngineFailure {
                        engine: engine.to_string(),
                        reason: EngineError::NotConfigured.to_string(),
                    }],
                })
            }
        }
    }

    /// Probe every engine concurrently. Never synthesizes and never fails:
    /// a probe error or timeout reports the engine as unavailable.
    pub async fn status(&self) -> StatusReport {
        let probes = self.engines.iter().map(|engine| {
            let engine = engine.clone();
            let limit = self.probe_timeout;
            async move {
                let name = engine.name().to_string();
                let probe = isolated({
                    let engine = engine.clone();
                    async move { engine.probe().await }
                });
                let up = match tokio::time::timeout(limit, probe).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        debug!("status: {name} unavailable: {e}");
                        false
                    }
                    Err(_) => {
                        debug!("status: {name} probe timed out after {limit:?}");
                        false
                    }
                };
                (name, up)
            }
        });

        StatusReport {
            engines: join_all(probes).await,
        }
    }

    /// The fallback algorithm over an explicit engine list.
    async fn run_chain(
        &self,
        text: &str,
        engines: &[Arc<dyn SpeechEngine>],
    ) -> Result<SynthesisOutcome, ValidationError> {
        let prepared = prepare_text(text, self.max_text_chars)?;
        if prepared.truncated {
            debug!("chain: text truncated to {} chars", self.max_text_chars);
        }

        let started = Instant::now();
        let mut failures = Vec::with_capacity(engines.len());

        for engine in engines {
            let name = engine.name().to_string();
            let left = self.chain_deadline.saturating_sub(started.elapsed());

            let result = if left.is_zero() {
                Err(EngineError::DeadlineExceeded(self.chain_deadline))
            } else {
                debug!("chain: trying {name}");
                attempt(engine.clone(), &prepared.text, self.attempt_timeout.min(left)).await
            };

            match result {
                Ok(audio) => {
                    info!(
                        "chain: {name} produced {} bytes ({})",
                        audio.bytes.len(),
                        audio.mime_type()
                    );
                    return Ok(SynthesisOutcome::Success { engine: name, audio });
                }
                Err(e) => {
                    warn!("chain: {name} failed: {e}");
                    failures.push(EngineFailure {
                        engine: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        warn!("chain: all {} engine(s) failed", failures.len());
        Ok(SynthesisOutcome::Unavailable {
            text: prepared.text,
            failures,
        })
    }
}

/// One bounded engine invocation on its own task.
async fn attempt(
    engine: Arc<dyn SpeechEngine>,
    text: &str,
    limit: Duration,
) -> Result<AudioResult, EngineError> {
    let text = text.to_string();
    let call = isolated(async move { engine.synthesize(&text).await });
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout(limit)),
    }
}
