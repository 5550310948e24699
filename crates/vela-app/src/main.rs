mod cli;
mod transcript;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use vela_ai::{
    AnthropicBackend, AnthropicConfig, BackendSelector, ChatBackend, ChatConfig, Gateway,
    GenBackend,
};
use vela_common::{Author, ControlSignal, Modality, SessionId, SignalBus, Turn};
use vela_config::schema::BackendConfig;
use vela_config::VelaConfig;
use vela_core::{
    ChannelSink, IntentExtractor, SessionContext, Sink, SinkFactory, SpeechSink, Supervisor,
};
use vela_memory::{GraphConfig, GraphStore, InMemoryStore, MemoryAdapter, MemoryStore};
use vela_tools::{
    crypto::CryptoPriceTool, schedule::SchedulePostTool, search::WebSearchTool,
    time::CurrentTimeTool, weather::WeatherTool, Invoker, ToolRegistry,
};

use crate::transcript::TranscriptServer;

/// Load environment variables from a .env file (KEY=VALUE lines).
fn load_dotenv() {
    let candidates = [".env", "config/.env"];
    for path in candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    let value = value.trim().trim_matches('"').trim_matches('\'');
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value);
                    }
                }
            }
            return;
        }
    }
}

fn env_or_empty(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Instantiate a backend tier from its config; Anthropic-style endpoints
/// speak the Messages API, everything else chat completions.
fn build_backend(config: &BackendConfig) -> Arc<dyn GenBackend> {
    let api_key = env_or_empty(&config.api_key_env);
    if api_key.is_empty() {
        warn!(backend = %config.id, "{} not set, backend will reject requests", config.api_key_env);
    }
    if config.base_url.contains("anthropic") {
        Arc::new(AnthropicBackend::new(
            AnthropicConfig::new(&config.id, &config.base_url, api_key)
                .with_model(&config.model)
                .with_temperature(config.temperature)
                .with_max_tokens(config.max_tokens),
        ))
    } else {
        Arc::new(ChatBackend::new(
            ChatConfig::new(&config.id, &config.base_url, api_key)
                .with_model(&config.model)
                .with_temperature(config.temperature)
                .with_max_tokens(config.max_tokens),
        ))
    }
}

fn build_registry(config: &VelaConfig) -> ToolRegistry {
    let tools = &config.tools;
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(WeatherTool::new(&tools.weather_endpoint)));
    registry.register(Arc::new(CurrentTimeTool::new(&tools.time_endpoint)));
    registry.register(Arc::new(SchedulePostTool::new(&tools.schedule_endpoint)));

    let crypto_key = env_or_empty(&tools.crypto_api_key_env);
    let mut crypto = CryptoPriceTool::new(&tools.crypto_endpoint);
    if !crypto_key.is_empty() {
        crypto = crypto.with_api_key(crypto_key);
    }
    registry.register(Arc::new(crypto));

    let search_key = env_or_empty(&tools.search_api_key_env);
    if search_key.is_empty() {
        warn!("{} not set, web search disabled", tools.search_api_key_env);
    } else {
        registry.register(Arc::new(WebSearchTool::new(
            &tools.search_endpoint,
            search_key,
        )));
    }

    registry
}

fn build_memory(config: &VelaConfig) -> Arc<dyn MemoryStore> {
    if config.memory.endpoint.is_empty() {
        warn!("no memory endpoint configured, using in-memory store");
        return Arc::new(InMemoryStore::new());
    }
    let mut graph = GraphConfig::new(&config.memory.endpoint);
    let api_key = env_or_empty(&config.memory.api_key_env);
    if !api_key.is_empty() {
        graph = graph.with_api_key(api_key);
    }
    Arc::new(GraphStore::new(graph))
}

#[tokio::main]
async fn main() {
    load_dotenv();
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("vela=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "vela=info".parse().unwrap()),
            ),
        )
        .init();

    info!("vela v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => vela_config::load_from_path(std::path::Path::new(path)),
        None => vela_config::load_config(),
    }
    .unwrap_or_else(|e| {
        warn!("config load failed, using defaults: {e}");
        VelaConfig::default()
    });
    let config = Arc::new(config);

    // Collaborators shared by every session.
    let memory = Arc::new(MemoryAdapter::new(
        build_memory(&config),
        Duration::from_millis(config.memory.recall_timeout_ms),
        Duration::from_millis(config.memory.commit_timeout_ms),
    ));
    let invoker = Arc::new(Invoker::new(
        Arc::new(build_registry(&config)),
        Duration::from_millis(config.tools.timeout_ms),
    ));
    let gateway = Arc::new(Gateway::new(
        build_backend(&config.generation.conversational),
        build_backend(&config.generation.reasoning),
        BackendSelector::new(
            config.generation.reasoning_intents.clone(),
            config.generation.reasoning_min_chars,
        ),
    ));
    let extractor = Arc::new(IntentExtractor::new(&config.intents));

    // Transcript broadcast server.
    let transcript = TranscriptServer::new(1024);
    let publisher = transcript.publisher();
    let bind = args.bind.clone().unwrap_or_else(|| config.transcript.bind.clone());
    tokio::spawn(async move {
        if let Err(e) = transcript.run(&bind).await {
            warn!("transcript server failed: {e}");
        }
    });

    // Pump per-session transcript sinks into the broadcast channel.
    let (transcript_tx, mut transcript_rx) = mpsc::channel(1024);
    tokio::spawn(async move {
        while let Some(event) = transcript_rx.recv().await {
            let _ = publisher.send(event);
        }
    });

    // Speech synthesis boundary: the synthesizer collaborator reads
    // sentence-chunked text from this channel.
    let (speech_tx, mut speech_rx) = mpsc::channel::<String>(256);
    tokio::spawn(async move {
        while let Some(sentence) = speech_rx.recv().await {
            debug!(len = sentence.len(), "sentence handed to synthesizer");
        }
    });

    let speech_enabled = config.fanout.speech_enabled;
    let sink_factory: SinkFactory = Box::new(move |_session_id| {
        let mut sinks: Vec<Arc<dyn Sink>> =
            vec![Arc::new(ChannelSink::new("transcript", transcript_tx.clone()))];
        if speech_enabled {
            sinks.push(Arc::new(SpeechSink::new(speech_tx.clone())));
        }
        sinks
    });

    let supervisor = Arc::new(Supervisor::new(
        SessionContext {
            config: Arc::clone(&config),
            extractor,
            memory,
            invoker,
            gateway,
        },
        sink_factory,
    ));

    // Out-of-band control signals.
    let bus = Arc::new(SignalBus::new(16));
    let control_supervisor = Arc::clone(&supervisor);
    let mut control_rx = bus.subscribe();
    let control = tokio::spawn(async move {
        while let Ok(signal) = control_rx.recv().await {
            match signal {
                ControlSignal::PauseAll => control_supervisor.pause_all().await,
                ControlSignal::ResumeAll => control_supervisor.resume_all().await,
                ControlSignal::Cancel(session_id) => {
                    if let Err(e) = control_supervisor
                        .cancel_current_generation(&session_id)
                        .await
                    {
                        warn!("cancel failed: {e}");
                    }
                }
                ControlSignal::Shutdown => {
                    control_supervisor.shutdown().await;
                    break;
                }
            }
        }
    });

    info!("ready — type a message, or /pause /resume /cancel /quit");
    run_console(&supervisor, &bus, &args.session).await;

    bus.publish(ControlSignal::Shutdown);
    let _ = control.await;
    info!("goodbye");
}

/// Console chat transport: each line is a text turn; slash commands map
/// to control signals.
async fn run_console(supervisor: &Supervisor, bus: &SignalBus, session: &str) {
    let session_id = SessionId::from_external(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin error: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "/quit" => break,
            "/pause" => {
                bus.publish(ControlSignal::PauseAll);
            }
            "/resume" => {
                bus.publish(ControlSignal::ResumeAll);
            }
            "/cancel" => {
                bus.publish(ControlSignal::Cancel(session_id.clone()));
            }
            _ => {
                let turn = Turn::now(session_id.clone(), Author::Host, trimmed, Modality::Text);
                if let Err(e) = supervisor.submit(turn).await {
                    warn!("turn rejected: {e}");
                }
            }
        }
    }
}
