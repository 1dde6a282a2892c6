use anyhow::Result;
use async_trait::async_trait;
use grounding::ValidatedTriple;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

use crate::store::{
    ConceptIdPolicy, EntityNode, GraphStats, GraphStore, MergeOptions, RelationEdge, distinct_ids,
};

type EdgeKey = (String, String, String);

#[derive(Default)]
struct GraphState {
    nodes: BTreeMap<String, EntityNode>,
    edges: BTreeMap<EdgeKey, RelationEdge>,
}

impl GraphState {
    fn upsert_node(
        &mut self,
        name: &str,
        concept_ids: &[String],
        document_id: &str,
        policy: ConceptIdPolicy,
    ) {
        let node = self
            .nodes
            .entry(name.to_string())
            .or_insert_with(|| EntityNode {
                name: name.to_string(),
                concept_ids: Vec::new(),
                documents: BTreeSet::new(),
            });

        node.documents.insert(document_id.to_string());
        match policy {
            ConceptIdPolicy::Replace => node.concept_ids = distinct_ids(concept_ids),
            ConceptIdPolicy::Union => {
                for id in concept_ids {
                    if !node.concept_ids.contains(id) {
                        node.concept_ids.push(id.clone());
                    }
                }
            }
        }
    }

    fn upsert_edge(&mut self, triple: &ValidatedTriple, document_id: &str) {
        let key = (
            triple.source.clone(),
            triple.target.clone(),
            triple.requested_relation.clone(),
        );
        let edge = self.edges.entry(key).or_insert_with(|| RelationEdge {
            source: triple.source.clone(),
            target: triple.target.clone(),
            relation: triple.requested_relation.clone(),
            documents: BTreeSet::new(),
            attested: false,
            ontology_codes: BTreeSet::new(),
        });

        edge.documents.insert(document_id.to_string());
        edge.attested |= triple.requested_relation_found;
        edge.ontology_codes.extend(triple.attested_codes());
    }
}

/// In-process graph store with the same merge semantics as the Neo4j store.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: Mutex<GraphState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn apply_batch(
        &self,
        document_id: &str,
        triples: &[ValidatedTriple],
        options: &MergeOptions,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        for triple in triples {
            state.upsert_node(&triple.source, &triple.source_ids, document_id, options.concept_ids);
            state.upsert_node(&triple.target, &triple.target_ids, document_id, options.concept_ids);
            state.upsert_edge(triple, document_id);
        }

        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state.lock().await;
        Ok(GraphStats {
            entity_count: state.nodes.len(),
            relation_count: state.edges.len(),
        })
    }

    async fn node(&self, name: &str) -> Result<Option<EntityNode>> {
        Ok(self.state.lock().await.nodes.get(name).cloned())
    }

    async fn edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<RelationEdge>> {
        let key = (source.to_string(), target.to_string(), relation.to_string());
        Ok(self.state.lock().await.edges.get(&key).cloned())
    }
}
