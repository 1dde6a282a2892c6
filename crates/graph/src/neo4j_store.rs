use anyhow::{Context, Result};
use async_trait::async_trait;
use grounding::ValidatedTriple;
use neo4rs::{Graph, Query};
use std::collections::BTreeSet;
use tokio::sync::Mutex;

use crate::store::{
    ConceptIdPolicy, EntityNode, GraphStats, GraphStore, MergeOptions, RelationEdge, distinct_ids,
};

/// Upserts one validated triple. Provenance lists only grow, and only with
/// identifiers they do not already hold.
const MERGE_TRIPLE: &str = r#"
MERGE (s:Entity {name: $source})
ON CREATE SET s.documents = [$document]
ON MATCH SET s.documents = CASE
    WHEN $document IN coalesce(s.documents, []) THEN s.documents
    ELSE coalesce(s.documents, []) + $document
END
SET s.concept_ids = CASE
    WHEN $union_ids THEN reduce(acc = coalesce(s.concept_ids, []), id IN $source_ids |
        CASE WHEN id IN acc THEN acc ELSE acc + id END)
    ELSE $source_ids
END

MERGE (t:Entity {name: $target})
ON CREATE SET t.documents = [$document]
ON MATCH SET t.documents = CASE
    WHEN $document IN coalesce(t.documents, []) THEN t.documents
    ELSE coalesce(t.documents, []) + $document
END
SET t.concept_ids = CASE
    WHEN $union_ids THEN reduce(acc = coalesce(t.concept_ids, []), id IN $target_ids |
        CASE WHEN id IN acc THEN acc ELSE acc + id END)
    ELSE $target_ids
END

MERGE (s)-[r:RELATED_TO {type: $relation}]->(t)
ON CREATE SET r.documents = [$document],
    r.attested = $attested,
    r.ontology_codes = $codes
ON MATCH SET r.documents = CASE
        WHEN $document IN coalesce(r.documents, []) THEN r.documents
        ELSE coalesce(r.documents, []) + $document
    END,
    r.attested = coalesce(r.attested, false) OR $attested,
    r.ontology_codes = reduce(acc = coalesce(r.ontology_codes, []), code IN $codes |
        CASE WHEN code IN acc THEN acc ELSE acc + code END)
"#;

pub struct Neo4jGraphStore {
    graph: Graph,
    /// Serializes batches issued from this process.
    write_gate: Mutex<()>,
}

impl Neo4jGraphStore {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            write_gate: Mutex::new(()),
        }
    }

    /// Connect and verify the server answers a trivial query.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context(format!("Failed to connect to Neo4j at {}", uri))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("Neo4j connectivity check failed")?;

        tracing::info!(uri, "Connected to Neo4j");
        Ok(Self::new(graph))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn merge_query(document_id: &str, triple: &ValidatedTriple, options: &MergeOptions) -> Query {
        Query::new(MERGE_TRIPLE.to_string())
            .param("document", document_id.to_string())
            .param("source", triple.source.clone())
            .param("target", triple.target.clone())
            .param("relation", triple.requested_relation.clone())
            .param("source_ids", distinct_ids(&triple.source_ids))
            .param("target_ids", distinct_ids(&triple.target_ids))
            .param("union_ids", options.concept_ids == ConceptIdPolicy::Union)
            .param("attested", triple.requested_relation_found)
            .param("codes", triple.attested_codes())
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    /// Initialize schema: uniqueness on entity names, index on relation type
    async fn init_schema(&self) -> Result<()> {
        tracing::info!("Creating Neo4j constraints and indexes");

        let query = Query::new(
            "CREATE CONSTRAINT entity_name_unique IF NOT EXISTS FOR (e:Entity) REQUIRE e.name IS UNIQUE"
                .to_string(),
        );
        self.graph.run(query).await
            .context("Failed to create uniqueness constraint on Entity.name")?;

        let query = Query::new(
            "CREATE INDEX related_to_type IF NOT EXISTS FOR ()-[r:RELATED_TO]-() ON (r.type)".to_string(),
        );
        self.graph.run(query).await
            .context("Failed to create index on RELATED_TO.type")?;

        Ok(())
    }

    async fn apply_batch(
        &self,
        document_id: &str,
        triples: &[ValidatedTriple],
        options: &MergeOptions,
    ) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let mut txn = self.graph.start_txn().await
            .context("Failed to open Neo4j transaction")?;

        for (position, triple) in triples.iter().enumerate() {
            if let Err(e) = txn.run(Self::merge_query(document_id, triple, options)).await {
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(document_id, error = %rollback, "Rollback failed");
                }
                return Err(e).context(format!(
                    "Failed to merge triple {} of document {}",
                    position, document_id
                ));
            }
        }

        txn.commit().await
            .context(format!("Failed to commit merge of document {}", document_id))?;

        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let entity_count = self
            .count("MATCH (e:Entity) RETURN count(e) as count")
            .await?;
        let relation_count = self
            .count("MATCH ()-[r:RELATED_TO]->() RETURN count(r) as count")
            .await?;

        Ok(GraphStats {
            entity_count,
            relation_count,
        })
    }

    async fn node(&self, name: &str) -> Result<Option<EntityNode>> {
        let query = Query::new(
            "MATCH (e:Entity {name: $name}) RETURN e.concept_ids as concept_ids, e.documents as documents"
                .to_string(),
        )
        .param("name", name.to_string());

        let mut result = self.graph.execute(query).await
            .context("Failed to look up entity")?;

        let Some(row) = result.next().await? else {
            return Ok(None);
        };

        Ok(Some(EntityNode {
            name: name.to_string(),
            concept_ids: row.get("concept_ids").unwrap_or_default(),
            documents: row
                .get::<Vec<String>>("documents")
                .unwrap_or_default()
                .into_iter()
                .collect(),
        }))
    }

    async fn edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<RelationEdge>> {
        let query = Query::new(
            r#"
            MATCH (:Entity {name: $source})-[r:RELATED_TO {type: $relation}]->(:Entity {name: $target})
            RETURN r.documents as documents, r.attested as attested, r.ontology_codes as codes
            "#
            .to_string(),
        )
        .param("source", source.to_string())
        .param("target", target.to_string())
        .param("relation", relation.to_string());

        let mut result = self.graph.execute(query).await
            .context("Failed to look up relation")?;

        let Some(row) = result.next().await? else {
            return Ok(None);
        };

        Ok(Some(RelationEdge {
            source: source.to_string(),
            target: target.to_string(),
            relation: relation.to_string(),
            documents: row
                .get::<Vec<String>>("documents")
                .unwrap_or_default()
                .into_iter()
                .collect(),
            attested: row.get("attested").unwrap_or(false),
            ontology_codes: row
                .get::<Vec<String>>("codes")
                .unwrap_or_default()
                .into_iter()
                .collect::<BTreeSet<_>>(),
        }))
    }
}
