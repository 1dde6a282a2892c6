use ontology::{OntologyIndex, normalize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    pub fuzzy: bool,
    /// Minimum similarity (0-100) a fuzzy candidate needs.
    pub threshold: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            threshold: 85.0,
        }
    }
}

impl ResolveOptions {
    pub fn exact_only() -> Self {
        Self {
            fuzzy: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy { key: String, score: f64 },
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub concept_ids: Vec<String>,
    pub kind: MatchKind,
}

/// Maps free-text mentions to concept ids through the label index.
#[derive(Clone, Copy)]
pub struct EntityResolver<'a> {
    index: &'a OntologyIndex,
    options: ResolveOptions,
}

impl<'a> EntityResolver<'a> {
    pub fn new(index: &'a OntologyIndex, options: ResolveOptions) -> Self {
        Self { index, options }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Concept ids for `mention`; empty when it cannot be grounded.
    pub fn resolve(&self, mention: &str) -> Vec<String> {
        self.resolve_detailed(mention).concept_ids
    }

    pub fn resolve_detailed(&self, mention: &str) -> Resolution {
        let normalized = normalize(mention);
        if normalized.is_empty() {
            return Resolution {
                concept_ids: Vec::new(),
                kind: MatchKind::Unresolved,
            };
        }

        if let Some(concepts) = self.index.concepts_for(&normalized) {
            return Resolution {
                concept_ids: concepts.to_vec(),
                kind: MatchKind::Exact,
            };
        }

        if self.options.fuzzy {
            if let Some((key, score)) = best_fuzzy_match(self.index, &normalized, self.options.threshold) {
                tracing::debug!(mention, key, score, "Fuzzy label match");
                return Resolution {
                    concept_ids: self.index.concepts_for(key).unwrap_or_default().to_vec(),
                    kind: MatchKind::Fuzzy {
                        key: key.to_string(),
                        score,
                    },
                };
            }
        }

        Resolution {
            concept_ids: Vec::new(),
            kind: MatchKind::Unresolved,
        }
    }
}

/// Indel similarity ratio of two strings on a 0-100 scale,
/// `(1 - indel / (len_a + len_b)) * 100`.
pub fn similarity(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// Highest similarity two strings of these lengths could reach: every
/// character of the length difference costs at least one insertion.
fn similarity_bound(a_len: usize, b_len: usize) -> f64 {
    let total = a_len + b_len;
    if total == 0 {
        return 100.0;
    }
    (1.0 - (a_len.abs_diff(b_len) as f64) / (total as f64)) * 100.0
}

/// Best-scoring label key at or above `threshold`.
///
/// Keys are visited in ascending order and only a strictly higher score
/// replaces the current best, so equal scores resolve to the least key.
pub fn best_fuzzy_match<'i>(
    index: &'i OntologyIndex,
    normalized: &str,
    threshold: f64,
) -> Option<(&'i str, f64)> {
    let query_len = normalized.chars().count();
    let mut best: Option<(&str, f64)> = None;

    for key in index.label_keys() {
        let bound = similarity_bound(query_len, key.chars().count());
        if bound < threshold || best.is_some_and(|(_, score)| bound <= score) {
            continue;
        }

        let score = similarity(normalized, key);
        if score >= threshold && best.is_none_or(|(_, current)| score > current) {
            best = Some((key, score));
        }
    }

    best
}
