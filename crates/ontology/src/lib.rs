pub mod builder;
pub mod index;
pub mod normalizer;
pub mod reader;
pub mod snapshot;
pub mod triple;

pub use builder::{IndexBuilder, build_index, try_build_index};
pub use index::{IndexStats, OntologyIndex};
pub use normalizer::normalize;
pub use reader::{OntologyFormat, build_index_from_file, read_triples};
pub use snapshot::{IndexHandle, IndexSnapshot};
pub use triple::{OntologyTriple, TripleTerm, is_schema_iri, local_id};
