mod config;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use graph::{GraphStore, KnowledgeGraphMerger, MemoryGraphStore, Neo4jGraphStore};
use ontology::{IndexHandle, OntologyIndex};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, GraphBackend};
use metrics::Metrics;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        backend = ?config.graph.backend,
        index = %config.index_path.display(),
        data_dir = %config.data_dir.display(),
        fuzzy = config.resolver.fuzzy,
        threshold = config.resolver.threshold,
        "Configuration loaded"
    );

    // Load the ontology index built by `build_index`
    let index_path = config.index_path.clone();
    let index = tokio::task::spawn_blocking(move || OntologyIndex::load(&index_path))
        .await
        .context("Index loading task panicked")??;
    let stats = index.stats();
    tracing::info!(
        labels = stats.labels,
        concept_pairs = stats.concept_pairs,
        "Ontology index ready"
    );

    // Connect the graph store
    let store: Arc<dyn GraphStore> = match config.graph.backend {
        GraphBackend::Neo4j => Arc::new(
            Neo4jGraphStore::connect(
                &config.graph.uri,
                &config.graph.username,
                &config.graph.password,
            )
            .await?,
        ),
        GraphBackend::Memory => {
            tracing::warn!("Using in-memory graph store; merged data is lost on shutdown");
            Arc::new(MemoryGraphStore::new())
        }
    };
    store
        .init_schema()
        .await
        .context("Failed to initialize graph schema")?;

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState {
        index: IndexHandle::new(index),
        merger: KnowledgeGraphMerger::new(store, config.merge),
        metrics: Metrics::new(),
        config,
    });

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context(format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
