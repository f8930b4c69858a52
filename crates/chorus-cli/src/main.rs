//! chorus CLI — speech synthesis relay with engine fallback.
//!
//! ```text
//! chorus serve [--port 8000] [--host 127.0.0.1] [--engines offline,neural,gtts]
//! chorus speak "hello world" [--engine neural] [--out hello.mp3]
//! chorus status [--server http://localhost:8000]
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chorus_core::types::{
    ChainConfig, EngineKind, GttsConfig, NeuralConfig, OfflineConfig, ServiceConfig,
};
use chorus_lib::engine::build_engines;
use chorus_lib::orchestrator::Orchestrator;
use chorus_lib::server::ENGINE_HEADER;

/// chorus — text-to-speech relay that falls back across engines
#[derive(Parser)]
#[command(name = "chorus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Synthesize text through a running server
    Speak {
        /// Text to speak
        text: String,
        /// Use a single engine instead of the fallback chain
        #[arg(long)]
        engine: Option<EngineKind>,
        /// Output file (default: speech.<ext> from the response)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Server URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
    /// Show which engines are available
    Status {
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Listen port
    #[arg(long, default_value = "8000")]
    port: u16,
    /// Listen host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Engines in priority order
    #[arg(long, value_delimiter = ',', default_value = "offline,neural,gtts")]
    engines: Vec<EngineKind>,
    /// Per-engine attempt timeout
    #[arg(long, default_value = "6")]
    attempt_timeout_secs: u64,
    /// Upper bound on the whole fallback chain
    #[arg(long, default_value = "14")]
    chain_deadline_secs: u64,
    /// Per-engine status probe timeout
    #[arg(long, default_value = "3")]
    probe_timeout_secs: u64,
    /// Strip markup and spell out symbols before synthesis
    #[arg(long)]
    clean_text: bool,

    /// espeak binary (default: espeak-ng, then espeak)
    #[arg(long)]
    espeak_binary: Option<String>,
    /// Force an espeak voice
    #[arg(long)]
    offline_voice: Option<String>,
    /// Preferred voice keywords, in order
    #[arg(long = "voice-hint", default_values = ["female", "woman"])]
    voice_hints: Vec<String>,

    /// Neural speech service URL
    #[arg(long, default_value = "http://localhost:8880")]
    neural_url: String,
    #[arg(long, env = "CHORUS_NEURAL_API_KEY", hide_env_values = true)]
    neural_api_key: Option<String>,
    #[arg(long, default_value = "af_heart")]
    neural_voice: String,
    #[arg(long, default_value = "kokoro")]
    neural_model: String,
    #[arg(long, default_value = "1.0")]
    neural_speed: f32,

    /// Google Translate TTS base URL
    #[arg(long, default_value = "https://translate.google.com")]
    gtts_url: String,
    #[arg(long, default_value = "en")]
    gtts_lang: String,
}

impl ServeArgs {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            chain: ChainConfig {
                engines: self.engines,
                attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
                chain_deadline: Duration::from_secs(self.chain_deadline_secs),
                probe_timeout: Duration::from_secs(self.probe_timeout_secs),
                ..Default::default()
            },
            offline: OfflineConfig {
                binary: self.espeak_binary,
                voice: self.offline_voice,
                voice_hints: self.voice_hints,
                ..Default::default()
            },
            neural: NeuralConfig {
                url: self.neural_url,
                api_key: self.neural_api_key,
                model: self.neural_model,
                voice: self.neural_voice,
                speed: self.neural_speed,
            },
            gtts: GttsConfig {
                url: self.gtts_url,
                lang: self.gtts_lang,
                ..Default::default()
            },
            clean_text: self.clean_text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Speak {
            text,
            engine,
            out,
            server,
        } => speak(&server, &text, engine, out).await,
        Command::Status { server } => {
            let resp = reqwest::Client::new()
                .get(format!("{server}/api/tts/status"))
                .send()
                .await?;
            println!("{}", resp.text().await?);
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let addr = format!("{}:{}", args.host, args.port);
    let config = args.into_config();

    let engines = build_engines(&config);
    let orchestrator = Arc::new(Orchestrator::new(engines, &config.chain));
    info!("fallback chain: {}", orchestrator.engine_names().join(" → "));
    let app = chorus_lib::server::router(orchestrator, config.clean_text);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("chorus listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("chorus stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}

async fn speak(
    server: &str,
    text: &str,
    engine: Option<EngineKind>,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let url = match engine {
        Some(EngineKind::Gtts) => return Err("gtts has no single-engine endpoint".into()),
        Some(kind) => format!("{server}/api/tts/{kind}"),
        None => format!("{server}/api/tts"),
    };
    let resp = reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await?;

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let status = resp.status();
    if !status.is_success() {
        eprintln!("{}", resp.text().await?);
        return Err(format!("server returned {status}").into());
    }
    if !content_type.starts_with("audio/") {
        // Browser-fallback JSON: every engine failed.
        println!("{}", resp.text().await?);
        return Err("no engine produced audio".into());
    }

    let engine = resp
        .headers()
        .get(ENGINE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let ext = if content_type == "audio/wav" { "wav" } else { "mp3" };
    let path = out.unwrap_or_else(|| PathBuf::from(format!("speech.{ext}")));

    let bytes = resp.bytes().await?;
    tokio::fs::write(&path, &bytes).await?;
    println!("{} bytes from {engine} → {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_replying(route: &str, reply: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(reply)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn speak_writes_audio() {
        let server = server_replying(
            "/api/tts",
            ResponseTemplate::new(200)
                .set_body_raw(b"ID3audio".to_vec(), "audio/mpeg")
                .insert_header(ENGINE_HEADER, "neural"),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hello.mp3");

        speak(&server.uri(), "hello", None, Some(out.clone())).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"ID3audio");
    }

    #[tokio::test]
    async fn speak_fails_on_error_status() {
        let server = server_replying(
            "/api/tts/neural",
            ResponseTemplate::new(503)
                .set_body_string(r#"{"error":"neural engine unavailable","engine":"neural"}"#),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp3");

        let err = speak(&server.uri(), "hello", Some(EngineKind::Neural), Some(out.clone()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"), "{err}");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn speak_fails_on_browser_fallback() {
        let server = server_replying(
            "/api/tts",
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "use_browser_tts": true,
                "text": "hello",
                "message": "All speech engines failed",
            })),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp3");

        assert!(speak(&server.uri(), "hello", None, Some(out.clone())).await.is_err());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn speak_rejects_gtts_without_request() {
        let err = speak("http://127.0.0.1:9", "hello", Some(EngineKind::Gtts), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gtts"));
    }
}
