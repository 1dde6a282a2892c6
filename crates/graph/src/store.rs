use anyhow::Result;
use async_trait::async_trait;
use grounding::ValidatedTriple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a node's concept ids change when it is merged again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptIdPolicy {
    /// The latest triple's resolved ids replace whatever was stored.
    #[default]
    Replace,
    /// Resolved ids accumulate across merges.
    Union,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    pub concept_ids: ConceptIdPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityNode {
    pub name: String,
    pub concept_ids: Vec<String>,
    pub documents: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub documents: BTreeSet<String>,
    /// Whether any merged triple had its requested relation attested.
    pub attested: bool,
    pub ontology_codes: BTreeSet<String>,
}

impl EntityNode {
    pub fn has_document(&self, document_id: &str) -> bool {
        self.documents.contains(document_id)
    }
}

impl RelationEdge {
    pub fn has_document(&self, document_id: &str) -> bool {
        self.documents.contains(document_id)
    }
}

/// Persistent knowledge graph backend.
///
/// `apply_batch` must apply all triples of one document atomically and must
/// serialize against concurrent batches touching the same keys.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn init_schema(&self) -> Result<()>;

    async fn apply_batch(
        &self,
        document_id: &str,
        triples: &[ValidatedTriple],
        options: &MergeOptions,
    ) -> Result<()>;

    async fn stats(&self) -> Result<GraphStats>;

    async fn node(&self, name: &str) -> Result<Option<EntityNode>>;

    async fn edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<RelationEdge>>;
}

/// Concept ids with duplicates removed, first occurrence kept.
pub(crate) fn distinct_ids(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_ids_keeps_order() {
        let ids: Vec<String> = ["C7", "C1", "C7", "C2", "C1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct_ids(&ids), vec!["C7", "C1", "C2"]);
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(serde_json::to_string(&ConceptIdPolicy::Union).unwrap(), "\"union\"");
        assert_eq!(ConceptIdPolicy::default(), ConceptIdPolicy::Replace);
    }
}
