use anyhow::{Context, Result};
use grounding::ValidatedTriple;
use serde::Serialize;
use std::sync::Arc;

use crate::store::{GraphStats, GraphStore, MergeOptions};

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub document_id: String,
    pub triples_merged: usize,
    pub triples_skipped: usize,
    pub nodes: usize,
    pub relationships: usize,
}

/// Writes validated triples into the knowledge graph, one document at a time.
#[derive(Clone)]
pub struct KnowledgeGraphMerger {
    store: Arc<dyn GraphStore>,
    options: MergeOptions,
}

impl KnowledgeGraphMerger {
    pub fn new(store: Arc<dyn GraphStore>, options: MergeOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }

    /// Upsert every triple of `document_id`, attested or not.
    ///
    /// Triples missing a source, target or relation name are skipped. A store
    /// failure aborts the whole document and is returned to the caller.
    pub async fn merge(&self, document_id: &str, triples: &[ValidatedTriple]) -> Result<MergeReport> {
        if document_id.trim().is_empty() {
            anyhow::bail!("Document identifier must not be blank");
        }

        let mut accepted = Vec::with_capacity(triples.len());
        for (position, triple) in triples.iter().enumerate() {
            if [&triple.source, &triple.target, &triple.requested_relation]
                .iter()
                .any(|field| field.trim().is_empty())
            {
                tracing::warn!(document_id, position, "Skipping triple with a blank name");
                continue;
            }
            accepted.push(triple.clone());
        }
        let skipped = triples.len() - accepted.len();

        self.store
            .apply_batch(document_id, &accepted, &self.options)
            .await
            .context(format!("Merge of document {} aborted", document_id))?;

        let GraphStats {
            entity_count,
            relation_count,
        } = self.store.stats().await.context("Failed to read graph statistics")?;

        tracing::info!(
            document_id,
            triples = accepted.len(),
            skipped,
            nodes = entity_count,
            relationships = relation_count,
            "Merged document into knowledge graph"
        );

        Ok(MergeReport {
            document_id: document_id.to_string(),
            triples_merged: accepted.len(),
            triples_skipped: skipped,
            nodes: entity_count,
            relationships: relation_count,
        })
    }
}
