use anyhow::{Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const ARTIFACT_MAGIC: &[u8; 8] = b"ONTOIDX\0";
const ARTIFACT_VERSION: u32 = 1;

/// Lookup tables produced by one pass over an ontology.
///
/// Keys of `labels` are normalized label text; values list concept ids in
/// the order the label triples were seen. `relations` maps an ordered
/// (subject, object) concept pair to the predicate codes linking them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyIndex {
    pub(crate) labels: BTreeMap<String, Vec<String>>,
    pub(crate) relations: BTreeMap<(String, String), BTreeSet<String>>,
    pub(crate) predicate_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub labels: usize,
    pub concept_pairs: usize,
    pub predicates_labelled: usize,
}

impl OntologyIndex {
    pub fn concepts_for(&self, normalized_label: &str) -> Option<&[String]> {
        self.labels.get(normalized_label).map(Vec::as_slice)
    }

    /// Every normalized label, in ascending order.
    pub fn label_keys(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn relation_codes(&self, source_id: &str, target_id: &str) -> Option<&BTreeSet<String>> {
        self.relations
            .get(&(source_id.to_string(), target_id.to_string()))
    }

    pub fn predicate_label(&self, code: &str) -> Option<&str> {
        self.predicate_labels.get(code).map(String::as_str)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            labels: self.labels.len(),
            concept_pairs: self.relations.len(),
            predicates_labelled: self.predicate_labels.len(),
        }
    }

    /// Write the index to `path`. The artifact is written beside the target
    /// and renamed into place, so readers never observe a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let staging = path.with_extension("partial");
        {
            let file = File::create(&staging)
                .with_context(|| format!("Failed to create {:?}", staging))?;
            let mut writer = BufWriter::new(file);

            writer
                .write_all(ARTIFACT_MAGIC)
                .and_then(|_| writer.write_all(&ARTIFACT_VERSION.to_le_bytes()))
                .context("Failed to write index header")?;
            bincode::options()
                .serialize_into(&mut writer, self)
                .context("Failed to write index body")?;
            writer.flush().context("Failed to flush index artifact")?;
        }

        fs::rename(&staging, path)
            .with_context(|| format!("Failed to move index artifact into {:?}", path))?;

        tracing::info!(path = %path.display(), labels = self.labels.len(), "Saved ontology index");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open index artifact {:?}", path))?;
        let artifact_len = file.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        let mut version = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .and_then(|_| reader.read_exact(&mut version))
            .with_context(|| format!("Failed to read index header from {:?}", path))?;
        if &magic != ARTIFACT_MAGIC {
            anyhow::bail!("{:?} is not an ontology index artifact", path);
        }
        let version = u32::from_le_bytes(version);
        if version != ARTIFACT_VERSION {
            anyhow::bail!("Unsupported index artifact version {} in {:?}", version, path);
        }

        // Length prefixes in a corrupt body must not exceed the file itself.
        let index: OntologyIndex = bincode::options()
            .with_limit(artifact_len)
            .deserialize_from(&mut reader)
            .context("Failed to decode index body")?;

        tracing::info!(
            path = %path.display(),
            labels = index.labels.len(),
            concept_pairs = index.relations.len(),
            "Loaded ontology index"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_index;
    use crate::triple::{OntologyTriple, RDFS_LABEL, SKOS_ALT_LABEL};

    const NS: &str = "http://example.org/onto#";

    fn sample_index() -> OntologyIndex {
        let c1 = format!("{NS}C1");
        let c2 = format!("{NS}C2");
        let rel = format!("{NS}R108");
        build_index(vec![
            OntologyTriple::literal(&c1, RDFS_LABEL, "BRCA1"),
            OntologyTriple::literal(&c1, SKOS_ALT_LABEL, "Breast Cancer Type 1 Gene"),
            OntologyTriple::literal(&c2, RDFS_LABEL, "Breast Cancer"),
            OntologyTriple::literal(&rel, RDFS_LABEL, "Gene_Associated_With_Disease"),
            OntologyTriple::link(&c1, &rel, &c2),
        ])
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ontology.idx");

        let index = sample_index();
        index.save(&path).unwrap();
        let reloaded = OntologyIndex::load(&path).unwrap();

        assert_eq!(reloaded, index);
        assert_eq!(reloaded.concepts_for("brca1"), Some(&["C1".to_string()][..]));
        assert!(reloaded.relation_codes("C1", "C2").unwrap().contains("R108"));
        assert_eq!(reloaded.predicate_label("R108"), Some("Gene_Associated_With_Disease"));
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn test_load_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.idx");
        std::fs::write(&path, b"definitely not an index").unwrap();

        assert!(OntologyIndex::load(&path).is_err());
    }

    #[test]
    fn test_stats() {
        let stats = sample_index().stats();
        assert_eq!(stats.labels, 4);
        assert_eq!(stats.concept_pairs, 1);
        assert_eq!(stats.predicates_labelled, 1);
    }
}
