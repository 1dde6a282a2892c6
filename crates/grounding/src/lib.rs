pub mod io;
pub mod resolver;
pub mod schema;
pub mod validator;

pub use resolver::{EntityResolver, MatchKind, ResolveOptions, Resolution};
pub use schema::{AttestedRelation, ExtractedTriple, RelationshipRecord, ValidatedTriple};
pub use validator::{RelationshipValidator, ValidationBatch, ValidationSummary};
