use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tokio::fs;

use crate::schema::ValidatedTriple;
use crate::validator::{RelationshipValidator, ValidationBatch};

async fn read_array(path: &Path, kind: &str) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)
        .await
        .context(format!("Failed to read {}: {:?}", kind, path))?;

    let value: Value = serde_json::from_str(&content)
        .context(format!("Failed to parse {}: {:?}", kind, path))?;

    match value {
        Value::Array(records) => Ok(records),
        _ => anyhow::bail!("Expected a JSON array of {} in {:?}", kind, path),
    }
}

/// Read an extraction output file: a JSON array of loosely-shaped records.
pub async fn read_extracted(path: &Path) -> Result<Vec<Value>> {
    read_array(path, "extracted triples").await
}

/// Read a validated-triples file. Returns the parsed triples and the number
/// of records skipped as malformed.
pub async fn read_validated(path: &Path) -> Result<(Vec<ValidatedTriple>, usize)> {
    let records = read_array(path, "validated triples").await?;
    Ok(parse_validated(&records))
}

/// Parse validated records one at a time, skipping the malformed ones.
pub fn parse_validated(records: &[Value]) -> (Vec<ValidatedTriple>, usize) {
    let mut triples = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for (position, record) in records.iter().enumerate() {
        match ValidatedTriple::from_value(record) {
            Ok(triple) => triples.push(triple),
            Err(reason) => {
                tracing::warn!(position, %reason, "Skipping malformed validated triple");
                skipped += 1;
            }
        }
    }

    (triples, skipped)
}

pub async fn write_validated(path: &Path, triples: &[ValidatedTriple]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create directory {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(triples)?;
    fs::write(path, json)
        .await
        .context(format!("Failed to write validated triples: {:?}", path))?;
    Ok(())
}

/// Validate every record in `input` and write the annotated records to `output`.
pub async fn validate_file(
    validator: &RelationshipValidator<'_>,
    input: &Path,
    output: &Path,
) -> Result<ValidationBatch> {
    let records = read_extracted(input).await?;
    let batch = validator.validate_values(&records);
    write_validated(output, &batch.triples).await?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        triples = batch.triples.len(),
        "Saved validation output"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveOptions;
    use ontology::build_index;
    use ontology::triple::{OntologyTriple, RDFS_LABEL};

    #[tokio::test]
    async fn test_validate_file_round_trip() {
        let index = build_index(vec![
            OntologyTriple::literal("http://example.org/onto#C1", RDFS_LABEL, "BRCA1"),
            OntologyTriple::literal("http://example.org/onto#C2", RDFS_LABEL, "breast cancer"),
        ]);
        let validator = RelationshipValidator::new(&index, ResolveOptions::default());

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("extracted_relationships.json");
        let output = dir.path().join("paper-1").join("validated_relationships.json");
        tokio::fs::write(
            &input,
            r#"[{"source": "BRCA1", "relation": "associated_with", "target": "Breast Cancer"},
                {"source": "BRCA1"}]"#,
        )
        .await
        .unwrap();

        let batch = validate_file(&validator, &input, &output).await.unwrap();
        assert_eq!(batch.summary.skipped, 1);

        let (written, skipped) = read_validated(&output).await.unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(written, batch.triples);
        assert!(written[0].valid_entities);

        let pretty = tokio::fs::read_to_string(&output).await.unwrap();
        assert!(pretty.contains("\n  {"));
    }

    #[tokio::test]
    async fn test_non_array_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.json");
        tokio::fs::write(&input, r#"{"source": "a"}"#).await.unwrap();

        assert!(read_extracted(&input).await.is_err());
    }

    #[test]
    fn test_malformed_validated_records_are_skipped() {
        let (triples, skipped) = parse_validated(&[
            serde_json::json!({"source": "BRCA1", "target": "breast cancer", "requested_relation": "associated_with"}),
            serde_json::json!({"target": "breast cancer", "requested_relation": "treats"}),
            serde_json::json!({"source": "tamoxifen", "target": "breast cancer", "requested_relation": 7}),
            serde_json::json!([1, 2, 3]),
        ]);

        assert_eq!(skipped, 3);
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].requested_relation, "associated_with");
    }
}
