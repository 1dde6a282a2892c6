use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A (source, relation, target) claim as produced by upstream extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTriple {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl ExtractedTriple {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
        }
    }

    /// Read one triple out of loosely-shaped JSON. Extra fields are ignored;
    /// a missing, non-string or blank required field is reported by name.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let field = |name: &str| -> Result<String, String> {
            match value.get(name).and_then(Value::as_str) {
                Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
                Some(_) => Err(format!("field '{}' is blank", name)),
                None => Err(format!("field '{}' is missing or not a string", name)),
            }
        };

        Ok(Self {
            source: field("source")?,
            relation: field("relation")?,
            target: field("target")?,
        })
    }
}

/// A relation code reported for a concept pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedRelation {
    pub code: String,
    pub label: String,
    pub is_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source_id: String,
    pub target_id: String,
    pub code: String,
    pub label: String,
    #[serde(rename = "is_requested_relation")]
    pub is_requested: bool,
}

/// An extracted triple annotated with its ontology grounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedTriple {
    pub source: String,
    pub target: String,
    pub requested_relation: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub target_ids: Vec<String>,
    #[serde(default)]
    pub valid_entities: bool,
    #[serde(default)]
    pub requested_relation_found: bool,
    #[serde(default)]
    pub all_relationships: Vec<RelationshipRecord>,
}

impl ValidatedTriple {
    /// A triple that has not been grounded at all.
    pub fn unresolved(triple: &ExtractedTriple) -> Self {
        Self {
            source: triple.source.clone(),
            target: triple.target.clone(),
            requested_relation: triple.relation.clone(),
            source_ids: Vec::new(),
            target_ids: Vec::new(),
            valid_entities: false,
            requested_relation_found: false,
            all_relationships: Vec::new(),
        }
    }

    /// Read one validated record; the grounding fields may be absent.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        Self::deserialize(value).map_err(|e| e.to_string())
    }

    /// Distinct ontology codes attested between any resolved pair.
    pub fn attested_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .all_relationships
            .iter()
            .map(|r| r.code.clone())
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let triple = ExtractedTriple::from_value(&json!({
            "source": "metformin",
            "relation": "inhibits",
            "target": "mTORC1",
            "evidence": "ignored"
        }))
        .unwrap();
        assert_eq!(triple, ExtractedTriple::new("metformin", "inhibits", "mTORC1"));

        let missing = ExtractedTriple::from_value(&json!({"source": "a", "target": "b"}));
        assert!(missing.unwrap_err().contains("relation"));

        let blank = ExtractedTriple::from_value(&json!({"source": " ", "relation": "r", "target": "b"}));
        assert!(blank.unwrap_err().contains("blank"));

        assert!(ExtractedTriple::from_value(&json!({"source": 1, "relation": "r", "target": "b"})).is_err());
    }

    #[test]
    fn test_validated_json_field_names() {
        let mut validated = ValidatedTriple::unresolved(&ExtractedTriple::new("BRCA1", "associated_with", "breast cancer"));
        validated.all_relationships.push(RelationshipRecord {
            source_id: "C1".into(),
            target_id: "C2".into(),
            code: "R108".into(),
            label: "Gene_Associated_With_Disease".into(),
            is_requested: true,
        });

        let value = serde_json::to_value(&validated).unwrap();
        assert_eq!(value["requested_relation"], "associated_with");
        assert_eq!(value["all_relationships"][0]["is_requested_relation"], true);
    }

    #[test]
    fn test_missing_grounding_fields_default() {
        let validated: ValidatedTriple = serde_json::from_value(json!({
            "source": "a",
            "target": "b",
            "requested_relation": "treats"
        }))
        .unwrap();
        assert!(validated.source_ids.is_empty());
        assert!(!validated.valid_entities);

        let missing = ValidatedTriple::from_value(&json!({"source": "a", "target": "b"}));
        assert!(missing.unwrap_err().contains("requested_relation"));
    }
}
