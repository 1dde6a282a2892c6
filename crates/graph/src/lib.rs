pub mod memory_store;
pub mod merger;
pub mod neo4j_store;
pub mod store;

pub use memory_store::MemoryGraphStore;
pub use merger::{KnowledgeGraphMerger, MergeReport};
pub use neo4j_store::Neo4jGraphStore;
pub use store::{
    ConceptIdPolicy, EntityNode, GraphStats, GraphStore, MergeOptions, RelationEdge,
};
