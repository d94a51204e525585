//! Voice Assistant Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_assistant_agent::{build_pipeline, ConversationServices, KeywordIntentClassifier};
use voice_assistant_config::{load_settings, Settings};
use voice_assistant_core::{KnowledgeStore, SpeechSynthesizer};
use voice_assistant_llm::{HttpLanguageModel, LlmClientConfig};
use voice_assistant_pipeline::{HttpRecognizer, HttpSynthesizer};
use voice_assistant_rag::{HttpEmbedder, JsonVectorStore, KnowledgeRetriever, RagError};
use voice_assistant_server::{create_router, init_metrics, AppState, KnowledgeServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("VOICE_ASSISTANT_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not initialized yet
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&config);
    config.validate()?;

    tracing::info!("Starting Voice Assistant Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_path = env.as_deref().unwrap_or("default"),
        model = %config.llm.model,
        "Configuration loaded"
    );

    let persistence = voice_assistant_persistence::init(&config.session).await?;
    tracing::info!(
        data_dir = %config.session.data_dir,
        sessions = persistence.sessions.count(),
        knowledge = persistence.knowledge.count(),
        "Persistence initialized"
    );

    let llm = Arc::new(HttpLanguageModel::new(LlmClientConfig::from(&config.llm))?);

    let retriever = if config.rag.enabled {
        match init_retriever(&config).await {
            Ok(retriever) => {
                tracing::info!(
                    endpoint = %config.rag.embedding_endpoint,
                    top_k = config.rag.top_k,
                    "Knowledge retrieval enabled"
                );
                Some(Arc::new(retriever))
            }
            Err(e) => {
                tracing::warn!("Failed to initialize retrieval: {}. RAG will be disabled.", e);
                None
            }
        }
    } else {
        None
    };

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = if config.speech.synthesis_enabled {
        Some(Arc::new(HttpSynthesizer::new(&config.speech)?))
    } else {
        None
    };
    let knowledge: Arc<dyn KnowledgeStore> = persistence.knowledge.clone();

    let services = ConversationServices {
        recognizer: Arc::new(HttpRecognizer::new(&config.speech)?),
        synthesizer,
        classifier: Arc::new(KeywordIntentClassifier::new()),
        llm,
        sessions: persistence.sessions.clone(),
        knowledge: Some(knowledge.clone()),
        retriever: retriever.clone(),
    };
    let knowledge_api = services
        .knowledge_worker(&config)
        .map(|worker| KnowledgeServices {
            store: knowledge,
            worker,
            retriever,
        });
    let pipeline = build_pipeline(services, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut state = AppState::new(
        config.clone(),
        pipeline,
        persistence.sessions.clone(),
        shutdown_rx,
    );
    if let Some(knowledge_api) = knowledge_api {
        state = state.with_knowledge(knowledge_api);
    }

    if config.observability.metrics_enabled {
        match init_metrics() {
            Ok(handle) => {
                tracing::info!("Initialized Prometheus metrics at /metrics");
                state = state.with_metrics(handle);
            }
            Err(e) => tracing::warn!("Failed to install metrics recorder: {}", e),
        }
    }

    let app = create_router(state);

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_assistant={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}

/// Vector store under the data directory plus the remote embedder
async fn init_retriever(config: &Settings) -> Result<KnowledgeRetriever, RagError> {
    let store = JsonVectorStore::open(&config.session.data_dir).await?;
    let embedder = HttpEmbedder::new(&config.rag, config.llm.api_key.clone())?;
    Ok(KnowledgeRetriever::new(
        Arc::new(embedder),
        Arc::new(store),
        &config.rag,
    ))
}
