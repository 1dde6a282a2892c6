use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::index::OntologyIndex;
use crate::normalizer::normalize;
use crate::triple::{
    DEFAULT_LABEL_PREDICATES, OntologyTriple, PREFERRED_LABEL_PREDICATES, TripleTerm, is_schema_iri,
    local_id,
};

/// Accumulates the label and relation indexes over a single pass of triples.
pub struct IndexBuilder {
    label_predicates: HashSet<String>,
    labels: BTreeMap<String, Vec<String>>,
    relations: BTreeMap<(String, String), BTreeSet<String>>,
    predicate_labels: BTreeMap<String, String>,
    /// Relation codes seen before their own label triple.
    unlabelled_predicates: BTreeSet<String>,
    /// First preferred label per subject, kept so predicates that appear
    /// after their label triple can still be named.
    preferred_labels: HashMap<String, String>,
    triples_seen: usize,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::with_label_predicates(DEFAULT_LABEL_PREDICATES)
    }

    pub fn with_label_predicates<I, S>(predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label_predicates: predicates.into_iter().map(Into::into).collect(),
            labels: BTreeMap::new(),
            relations: BTreeMap::new(),
            predicate_labels: BTreeMap::new(),
            unlabelled_predicates: BTreeSet::new(),
            preferred_labels: HashMap::new(),
            triples_seen: 0,
        }
    }

    pub fn triples_seen(&self) -> usize {
        self.triples_seen
    }

    pub fn push(&mut self, triple: &OntologyTriple) {
        self.triples_seen += 1;

        let Some(subject) = triple.subject.as_iri() else {
            return;
        };

        match &triple.object {
            TripleTerm::Literal(text) if self.label_predicates.contains(&triple.predicate) => {
                self.index_label(subject, &triple.predicate, text);
            }
            TripleTerm::Iri(object) if !is_schema_iri(subject) && !is_schema_iri(object) => {
                self.index_relation(subject, &triple.predicate, object);
            }
            _ => {}
        }
    }

    fn index_label(&mut self, subject: &str, predicate: &str, text: &str) {
        let concept_id = local_id(subject);

        if PREFERRED_LABEL_PREDICATES.contains(&predicate) {
            if self.unlabelled_predicates.remove(concept_id) {
                self.predicate_labels
                    .insert(concept_id.to_string(), text.to_string());
            }
            self.preferred_labels
                .entry(concept_id.to_string())
                .or_insert_with(|| text.to_string());
        }

        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }
        self.labels
            .entry(normalized)
            .or_default()
            .push(concept_id.to_string());
    }

    fn index_relation(&mut self, subject: &str, predicate: &str, object: &str) {
        let code = local_id(predicate);

        if !self.predicate_labels.contains_key(code) {
            match self.preferred_labels.get(code) {
                Some(label) => {
                    self.predicate_labels.insert(code.to_string(), label.clone());
                }
                None => {
                    self.unlabelled_predicates.insert(code.to_string());
                }
            }
        }

        self.relations
            .entry((local_id(subject).to_string(), local_id(object).to_string()))
            .or_default()
            .insert(code.to_string());
    }

    pub fn finish(self) -> OntologyIndex {
        tracing::info!(
            triples = self.triples_seen,
            labels = self.labels.len(),
            concept_pairs = self.relations.len(),
            predicates_labelled = self.predicate_labels.len(),
            predicates_unlabelled = self.unlabelled_predicates.len(),
            "Built ontology index"
        );

        OntologyIndex {
            labels: self.labels,
            relations: self.relations,
            predicate_labels: self.predicate_labels,
        }
    }
}

/// Build an index from an in-memory or streamed sequence of triples.
pub fn build_index<I>(triples: I) -> OntologyIndex
where
    I: IntoIterator<Item = OntologyTriple>,
{
    let mut builder = IndexBuilder::new();
    for triple in triples {
        builder.push(&triple);
    }
    builder.finish()
}

/// Like [`build_index`], but for fallible sources. The first error aborts the
/// build and nothing is returned.
pub fn try_build_index<I>(triples: I) -> Result<OntologyIndex>
where
    I: IntoIterator<Item = Result<OntologyTriple>>,
{
    let mut builder = IndexBuilder::new();
    for triple in triples {
        builder.push(&triple?);
    }
    Ok(builder.finish())
}
