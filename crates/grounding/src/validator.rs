use ontology::OntologyIndex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::resolver::{EntityResolver, MatchKind, ResolveOptions};
use crate::schema::{AttestedRelation, ExtractedTriple, RelationshipRecord, ValidatedTriple};

/// Counters describing one validation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub triples: usize,
    pub skipped: usize,
    pub valid_entities: usize,
    pub requested_relation_found: usize,
    pub mentions_exact: usize,
    pub mentions_fuzzy: usize,
    pub mentions_unresolved: usize,
}

impl ValidationSummary {
    fn count_mention(&mut self, kind: &MatchKind) {
        match kind {
            MatchKind::Exact => self.mentions_exact += 1,
            MatchKind::Fuzzy { .. } => self.mentions_fuzzy += 1,
            MatchKind::Unresolved => self.mentions_unresolved += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationBatch {
    pub triples: Vec<ValidatedTriple>,
    pub summary: ValidationSummary,
}

/// Checks extracted triples against the ontology.
pub struct RelationshipValidator<'a> {
    index: &'a OntologyIndex,
    resolver: EntityResolver<'a>,
}

impl<'a> RelationshipValidator<'a> {
    pub fn new(index: &'a OntologyIndex, options: ResolveOptions) -> Self {
        Self {
            index,
            resolver: EntityResolver::new(index, options),
        }
    }

    pub fn resolver(&self) -> &EntityResolver<'a> {
        &self.resolver
    }

    /// Relation codes the ontology records from `source_id` to `target_id`.
    ///
    /// A code counts as the requested relation when the request equals the
    /// code, or appears inside the code's label; both checks ignore case.
    pub fn find_relationships(
        &self,
        source_id: &str,
        target_id: &str,
        requested_relation: Option<&str>,
    ) -> Vec<AttestedRelation> {
        let Some(codes) = self.index.relation_codes(source_id, target_id) else {
            return Vec::new();
        };

        let requested = requested_relation
            .map(str::to_lowercase)
            .filter(|r| !r.is_empty());

        codes
            .iter()
            .map(|code| {
                let label = self.index.predicate_label(code).unwrap_or_default();
                let is_requested = requested.as_deref().is_some_and(|r| {
                    r == code.to_lowercase() || label.to_lowercase().contains(r)
                });

                AttestedRelation {
                    code: code.clone(),
                    label: label.to_string(),
                    is_requested,
                }
            })
            .collect()
    }

    pub fn validate_triple(&self, triple: &ExtractedTriple) -> ValidatedTriple {
        self.validate_counted(triple, &mut ValidationSummary::default())
    }

    pub fn validate(&self, triples: &[ExtractedTriple]) -> Vec<ValidatedTriple> {
        let mut summary = ValidationSummary::default();
        triples
            .iter()
            .map(|triple| self.validate_counted(triple, &mut summary))
            .collect()
    }

    /// Validate raw JSON records, skipping malformed ones with a warning.
    pub fn validate_values(&self, values: &[Value]) -> ValidationBatch {
        let mut summary = ValidationSummary::default();
        let mut triples = Vec::with_capacity(values.len());

        for (position, value) in values.iter().enumerate() {
            match ExtractedTriple::from_value(value) {
                Ok(triple) => triples.push(self.validate_counted(&triple, &mut summary)),
                Err(reason) => {
                    tracing::warn!(position, %reason, "Skipping malformed extracted triple");
                    summary.skipped += 1;
                }
            }
        }

        tracing::info!(
            triples = summary.triples,
            skipped = summary.skipped,
            valid_entities = summary.valid_entities,
            requested_relation_found = summary.requested_relation_found,
            "Validated batch"
        );

        ValidationBatch { triples, summary }
    }

    fn validate_counted(
        &self,
        triple: &ExtractedTriple,
        summary: &mut ValidationSummary,
    ) -> ValidatedTriple {
        summary.triples += 1;

        let source = self.resolver.resolve_detailed(&triple.source);
        let target = self.resolver.resolve_detailed(&triple.target);
        summary.count_mention(&source.kind);
        summary.count_mention(&target.kind);

        let mut validated = ValidatedTriple::unresolved(triple);
        validated.source_ids = source.concept_ids;
        validated.target_ids = target.concept_ids;
        validated.valid_entities = !validated.source_ids.is_empty() && !validated.target_ids.is_empty();

        if !validated.valid_entities {
            return validated;
        }
        summary.valid_entities += 1;

        let mut seen_pairs = HashSet::new();
        for source_id in &validated.source_ids {
            for target_id in &validated.target_ids {
                if !seen_pairs.insert((source_id.as_str(), target_id.as_str())) {
                    continue;
                }

                for relation in self.find_relationships(source_id, target_id, Some(&triple.relation)) {
                    validated.requested_relation_found |= relation.is_requested;
                    validated.all_relationships.push(RelationshipRecord {
                        source_id: source_id.clone(),
                        target_id: target_id.clone(),
                        code: relation.code,
                        label: relation.label,
                        is_requested: relation.is_requested,
                    });
                }
            }
        }

        if validated.requested_relation_found {
            summary.requested_relation_found += 1;
        }
        validated
    }
}
