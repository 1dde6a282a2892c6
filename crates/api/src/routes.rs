use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use graph::{EntityNode, GraphStats, KnowledgeGraphMerger, MergeReport, RelationEdge};
use grounding::{RelationshipValidator, ValidatedTriple, ValidationBatch, ValidationSummary};
use ontology::{IndexHandle, IndexStats, OntologyIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

pub struct AppState {
    pub config: AppConfig,
    pub index: IndexHandle,
    pub merger: KnowledgeGraphMerger,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/validate", post(validate_triples))
        .route("/merge", post(merge_document))
        .route("/ingest", post(ingest_document))
        .route("/index/reload", post(reload_index))
        .route("/provenance/entity/:name", get(entity_provenance))
        .route("/provenance/relation", get(relation_provenance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    graph: String,
    index_version: u64,
}

#[derive(Deserialize)]
struct ValidateRequest {
    /// Inline extracted triples; takes precedence over `input_path`.
    triples: Option<Vec<Value>>,
    input_path: Option<String>,
    output_path: Option<String>,
}

#[derive(Serialize)]
struct ValidateResponse {
    index_version: u64,
    summary: ValidationSummary,
    triples: Vec<ValidatedTriple>,
}

#[derive(Deserialize)]
struct MergeRequest {
    document_id: String,
    /// Validated records; malformed ones are skipped individually.
    triples: Option<Vec<Value>>,
    input_path: Option<String>,
}

#[derive(Deserialize)]
struct IngestRequest {
    document_id: String,
    triples: Vec<Value>,
    output_path: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    index_version: u64,
    validation: ValidationSummary,
    merge: MergeReport,
}

#[derive(Deserialize, Default)]
struct ReloadRequest {
    path: Option<String>,
}

#[derive(Serialize)]
struct ReloadResponse {
    index_version: u64,
    index: IndexStats,
}

#[derive(Deserialize)]
struct DocumentFilter {
    document: Option<String>,
}

#[derive(Deserialize)]
struct RelationQuery {
    source: String,
    target: String,
    relation: String,
    document: Option<String>,
}

#[derive(Serialize)]
struct EntityProvenance {
    entity: EntityNode,
    /// Present when the request named a document.
    contributed: Option<bool>,
}

#[derive(Serialize)]
struct RelationProvenance {
    relation: RelationEdge,
    contributed: Option<bool>,
}

#[derive(Serialize)]
struct StatsResponse {
    graph: GraphStats,
    index_version: u64,
    index: IndexStats,
    metrics: MetricsSnapshot,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let graph = match state.merger.store().stats().await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        graph,
        index_version: state.index.snapshot().version,
    })
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, StatusCode> {
    let graph = state.merger.store().stats().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read graph statistics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let snapshot = state.index.snapshot();

    Ok(Json(StatsResponse {
        graph,
        index_version: snapshot.version,
        index: snapshot.index.stats(),
        metrics: state.metrics.snapshot(),
    }))
}

/// Ground records against the current index snapshot off the async runtime.
async fn run_validation(
    state: &AppState,
    records: Vec<Value>,
) -> Result<(u64, ValidationBatch), StatusCode> {
    let snapshot = state.index.snapshot();
    let version = snapshot.version;
    let options = state.config.resolver;
    let timer = TimedOperation::start();

    let batch = tokio::task::spawn_blocking(move || {
        RelationshipValidator::new(&snapshot.index, options).validate_values(&records)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Validation task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    state.metrics.record_validation(timer.elapsed(), &batch.summary);
    Ok((version, batch))
}

/// Map a client-named path into the data directory, rejecting escapes.
fn client_path(state: &AppState, path: Option<&str>) -> Result<Option<PathBuf>, StatusCode> {
    path.map(|path| {
        state.config.data_path(path).map_err(|e| {
            tracing::warn!(error = %e, "Rejected client path");
            StatusCode::BAD_REQUEST
        })
    })
    .transpose()
}

async fn write_output(path: Option<&FsPath>, triples: &[ValidatedTriple]) -> Result<(), StatusCode> {
    let Some(path) = path else {
        return Ok(());
    };
    grounding::io::write_validated(path, triples)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to write validation output");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn validate_triples(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, StatusCode> {
    let output = client_path(&state, req.output_path.as_deref())?;
    let input = client_path(&state, req.input_path.as_deref())?;

    let records = match (req.triples, input) {
        (Some(triples), _) => triples,
        (None, Some(path)) => grounding::io::read_extracted(&path)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read extracted triples");
                StatusCode::BAD_REQUEST
            })?,
        (None, None) => return Err(StatusCode::BAD_REQUEST),
    };

    let result = run_validation(&state, records).await;
    state.metrics.record_request(result.is_ok());
    let (index_version, batch) = result?;

    write_output(output.as_deref(), &batch.triples).await?;

    Ok(Json(ValidateResponse {
        index_version,
        summary: batch.summary,
        triples: batch.triples,
    }))
}

async fn merge_into_graph(
    state: &AppState,
    document_id: &str,
    triples: &[ValidatedTriple],
) -> Result<MergeReport, StatusCode> {
    let timer = TimedOperation::start();
    let result = state.merger.merge(document_id, triples).await;
    state.metrics.record_merge(timer.elapsed(), result.is_ok());

    result.map_err(|e| {
        tracing::error!(document_id, error = %format!("{:#}", e), "Merge failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn merge_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<MergeReport>, StatusCode> {
    if req.document_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let input = client_path(&state, req.input_path.as_deref())?;

    let (triples, rejected) = match (req.triples, input) {
        (Some(records), _) => grounding::io::parse_validated(&records),
        (None, Some(path)) => grounding::io::read_validated(&path)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read validated triples");
                StatusCode::BAD_REQUEST
            })?,
        (None, None) => return Err(StatusCode::BAD_REQUEST),
    };

    let result = merge_into_graph(&state, &req.document_id, &triples).await;
    state.metrics.record_request(result.is_ok());

    let mut report = result?;
    report.triples_skipped += rejected;
    Ok(Json(report))
}

async fn ingest_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, StatusCode> {
    if req.document_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let output = client_path(&state, req.output_path.as_deref())?;

    let (index_version, batch) = run_validation(&state, req.triples).await?;
    write_output(output.as_deref(), &batch.triples).await?;

    let result = merge_into_graph(&state, &req.document_id, &batch.triples).await;
    state.metrics.record_request(result.is_ok());

    Ok(Json(IngestResponse {
        index_version,
        validation: batch.summary,
        merge: result?,
    }))
}

async fn reload_index(
    State(state): State<Arc<AppState>>,
    req: Option<Json<ReloadRequest>>,
) -> Result<Json<ReloadResponse>, StatusCode> {
    let Json(req) = req.unwrap_or_default();
    let path = client_path(&state, req.path.as_deref())?
        .unwrap_or_else(|| state.config.index_path.clone());

    let loaded = tokio::task::spawn_blocking(move || OntologyIndex::load(&path))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Index reload task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // A failed load leaves the current snapshot in place.
    let index = loaded.map_err(|e| {
        tracing::error!(error = %format!("{:#}", e), "Index reload failed");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let stats = index.stats();
    let index_version = state.index.swap(index);

    Ok(Json(ReloadResponse {
        index_version,
        index: stats,
    }))
}

async fn entity_provenance(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<EntityProvenance>, StatusCode> {
    let node = state.merger.store().node(&name).await.map_err(|e| {
        tracing::error!(error = %e, "Entity lookup failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let entity = node.ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(EntityProvenance {
        contributed: filter.document.as_deref().map(|d| entity.has_document(d)),
        entity,
    }))
}

async fn relation_provenance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RelationQuery>,
) -> Result<Json<RelationProvenance>, StatusCode> {
    let edge = state
        .merger
        .store()
        .edge(&query.source, &query.target, &query.relation)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Relation lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let relation = edge.ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(RelationProvenance {
        contributed: query.document.as_deref().map(|d| relation.has_document(d)),
        relation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use graph::{MemoryGraphStore, MergeOptions};
    use ontology::build_index;
    use ontology::triple::{OntologyTriple, RDFS_LABEL};
    use serde_json::json;
    use tower::ServiceExt;

    const NS: &str = "http://example.org/onto#";

    fn test_index() -> OntologyIndex {
        build_index(vec![
            OntologyTriple::literal(&format!("{NS}C1"), RDFS_LABEL, "BRCA1"),
            OntologyTriple::literal(&format!("{NS}C2"), RDFS_LABEL, "breast cancer"),
            OntologyTriple::literal(&format!("{NS}R108"), RDFS_LABEL, "Gene_Associated_With_Disease"),
            OntologyTriple::link(&format!("{NS}C1"), &format!("{NS}R108"), &format!("{NS}C2")),
        ])
    }

    fn test_state() -> Arc<AppState> {
        test_state_in(AppConfig::default())
    }

    fn test_state_in(config: AppConfig) -> Arc<AppState> {
        Arc::new(AppState {
            config,
            index: IndexHandle::new(test_index()),
            merger: KnowledgeGraphMerger::new(Arc::new(MemoryGraphStore::new()), MergeOptions::default()),
            metrics: Metrics::new(),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_ingest_then_query_provenance() {
        let app = router(test_state());
        let triples = json!([
            {"source": "brca1", "relation": "associated_with", "target": "Breast Cancer"},
            {"source": "BRCA1", "relation": "gene_associated", "target": "breast cancer"},
            {"relation": "missing source", "target": "breast cancer"}
        ]);

        let (status, body) = send(
            &app,
            "POST",
            "/ingest",
            Some(json!({"document_id": "paper-1", "triples": triples})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["validation"]["skipped"], 1);
        assert_eq!(body["validation"]["requested_relation_found"], 2);
        assert_eq!(body["merge"]["relationships"], 2);

        let (status, body) = send(&app, "GET", "/provenance/entity/brca1?document=paper-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contributed"], true);
        assert_eq!(body["entity"]["concept_ids"], json!(["C1"]));

        let (status, body) = send(
            &app,
            "GET",
            "/provenance/relation?source=brca1&target=Breast%20Cancer&relation=associated_with&document=paper-2",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contributed"], false);

        let (status, _) = send(&app, "GET", "/provenance/entity/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validate_without_input_is_rejected() {
        let app = router(test_state());
        let (status, _) = send(&app, "POST", "/validate", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent_over_http() {
        let app = router(test_state());
        let validated = json!([{
            "source": "BRCA1",
            "target": "breast cancer",
            "requested_relation": "associated_with",
            "source_ids": ["C1"],
            "target_ids": ["C2"]
        }]);
        let request = json!({"document_id": "paper-1", "triples": validated});

        let (_, first) = send(&app, "POST", "/merge", Some(request.clone())).await;
        let (status, second) = send(&app, "POST", "/merge", Some(request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["nodes"], second["nodes"]);
        assert_eq!(second["relationships"], 1);

        let (_, stats) = send(&app, "GET", "/stats", None).await;
        assert_eq!(stats["metrics"]["documents_merged"], 2);
    }

    #[tokio::test]
    async fn test_merge_skips_malformed_records() {
        let state = test_state();
        let app = router(state.clone());
        let records = json!([
            {"source": "BRCA1", "target": "breast cancer", "requested_relation": "associated_with"},
            {"target": "breast cancer", "requested_relation": "treats"},
            {"source": "tamoxifen", "target": "breast cancer"},
            "not a record"
        ]);

        let (status, report) = send(
            &app,
            "POST",
            "/merge",
            Some(json!({"document_id": "paper-1", "triples": records})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["triples_merged"], 1);
        assert_eq!(report["triples_skipped"], 3);
        assert_eq!(report["relationships"], 1);
        assert!(state.merger.store().node("tamoxifen").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_in(AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        });
        let app = router(state.clone());

        build_index(vec![OntologyTriple::literal(&format!("{NS}C9"), RDFS_LABEL, "tamoxifen")])
            .save(&dir.path().join("next.idx"))
            .unwrap();

        let (status, body) = send(&app, "POST", "/index/reload", Some(json!({"path": "next.idx"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index_version"], 2);

        let (_, body) = send(
            &app,
            "POST",
            "/validate",
            Some(json!({"triples": [{"source": "Tamoxifen", "relation": "treats", "target": "BRCA1"}]})),
        )
        .await;
        assert_eq!(body["index_version"], 2);
        assert_eq!(body["triples"][0]["source_ids"], json!(["C9"]));
        assert_eq!(body["triples"][0]["valid_entities"], false);

        let (status, _) = send(&app, "POST", "/index/reload", Some(json!({"path": "missing.idx"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.index.snapshot().version, 2);
    }

    #[tokio::test]
    async fn test_paths_outside_data_dir_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let state = test_state_in(AppConfig {
            data_dir: data_dir.clone(),
            ..AppConfig::default()
        });
        let app = router(state.clone());
        let triples = json!([{"source": "BRCA1", "relation": "associated_with", "target": "breast cancer"}]);

        let escape = dir.path().join("escaped.json");
        let requests = [
            ("/validate", json!({"triples": triples, "output_path": "../escaped.json"})),
            ("/validate", json!({"triples": triples, "output_path": escape.to_string_lossy()})),
            ("/validate", json!({"input_path": "../../etc/passwd"})),
            ("/ingest", json!({"document_id": "paper-1", "triples": triples, "output_path": "../x"})),
            ("/merge", json!({"document_id": "paper-1", "input_path": "/etc/passwd"})),
            ("/index/reload", json!({"path": "../ontology_index.bin"})),
        ];
        for (uri, body) in requests {
            let (status, _) = send(&app, "POST", uri, Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", uri, body);
        }
        assert!(!escape.exists());
        assert_eq!(state.merger.store().stats().await.unwrap().entity_count, 0);

        let (status, _) = send(
            &app,
            "POST",
            "/validate",
            Some(json!({"triples": triples, "output_path": "paper-1/validated.json"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(data_dir.join("paper-1/validated.json").exists());

        let (status, report) = send(
            &app,
            "POST",
            "/merge",
            Some(json!({"document_id": "paper-1", "input_path": "paper-1/validated.json"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["triples_merged"], 1);
    }
}
