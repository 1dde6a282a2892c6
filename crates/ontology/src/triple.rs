use serde::{Deserialize, Serialize};

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const OBO_EXACT_SYNONYM: &str = "http://www.geneontology.org/formats/oboInOwl#hasExactSynonym";

/// Predicates whose literal objects name the subject concept.
pub const DEFAULT_LABEL_PREDICATES: [&str; 4] = [
    RDFS_LABEL,
    SKOS_PREF_LABEL,
    SKOS_ALT_LABEL,
    OBO_EXACT_SYNONYM,
];

/// Predicates used to give relation codes a human-readable label.
pub const PREFERRED_LABEL_PREDICATES: [&str; 2] = [RDFS_LABEL, SKOS_PREF_LABEL];

/// Namespaces of the RDF, RDFS, OWL and XSD vocabularies. IRIs under them
/// describe the ontology's schema rather than its concepts.
pub const SCHEMA_NAMESPACES: [&str; 4] = [
    "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
    "http://www.w3.org/2000/01/rdf-schema#",
    "http://www.w3.org/2002/07/owl#",
    "http://www.w3.org/2001/XMLSchema#",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripleTerm {
    Iri(String),
    BlankNode(String),
    Literal(String),
}

impl TripleTerm {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            TripleTerm::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            TripleTerm::Literal(value) => Some(value),
            _ => None,
        }
    }
}

/// One statement from the ontology source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyTriple {
    pub subject: TripleTerm,
    pub predicate: String,
    pub object: TripleTerm,
}

impl OntologyTriple {
    pub fn new(subject: TripleTerm, predicate: impl Into<String>, object: TripleTerm) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    /// Shorthand for a concept-to-literal statement.
    pub fn literal(subject: &str, predicate: &str, value: &str) -> Self {
        Self::new(
            TripleTerm::Iri(subject.to_string()),
            predicate,
            TripleTerm::Literal(value.to_string()),
        )
    }

    /// Shorthand for a concept-to-concept statement.
    pub fn link(subject: &str, predicate: &str, object: &str) -> Self {
        Self::new(
            TripleTerm::Iri(subject.to_string()),
            predicate,
            TripleTerm::Iri(object.to_string()),
        )
    }
}

/// Local identifier of an IRI: the fragment after the last `#`, or the last
/// path segment when the IRI has no fragment.
pub fn local_id(iri: &str) -> &str {
    match iri.rsplit_once('#') {
        Some((_, fragment)) => fragment,
        None => iri.rsplit_once('/').map_or(iri, |(_, segment)| segment),
    }
}

pub fn is_schema_iri(iri: &str) -> bool {
    SCHEMA_NAMESPACES.iter().any(|ns| iri.starts_with(ns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_id() {
        assert_eq!(local_id("http://ncicb.nci.nih.gov/xml/owl/EVS/Thesaurus.owl#C3262"), "C3262");
        assert_eq!(local_id("http://purl.obolibrary.org/obo/NCIT_C3262"), "NCIT_C3262");
        assert_eq!(local_id("http://example.org/a#b#C1"), "C1");
        assert_eq!(local_id("C42"), "C42");
    }

    #[test]
    fn test_schema_iris() {
        assert!(is_schema_iri("http://www.w3.org/2002/07/owl#Class"));
        assert!(is_schema_iri("http://www.w3.org/2000/01/rdf-schema#Resource"));
        assert!(!is_schema_iri("http://ncicb.nci.nih.gov/xml/owl/EVS/Thesaurus.owl#C3262"));
    }
}
