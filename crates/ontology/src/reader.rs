use anyhow::{Context, Result, anyhow};
use sophia::api::source::TripleSource;
use sophia::api::term::{Term, TermKind};
use sophia::api::triple::Triple;
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::builder::IndexBuilder;
use crate::index::OntologyIndex;
use crate::triple::{OntologyTriple, TripleTerm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OntologyFormat {
    NTriples,
    Turtle,
    RdfXml,
}

impl OntologyFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "nt" => Ok(Self::NTriples),
            "ttl" | "turtle" => Ok(Self::Turtle),
            "owl" | "rdf" | "xml" => Ok(Self::RdfXml),
            _ => anyhow::bail!("Unsupported ontology format: {:?}", path),
        }
    }
}

/// Parse an ontology file in a single streaming pass and build its index.
///
/// Any parse error aborts the build; no partial index is returned.
pub fn build_index_from_file(path: &Path) -> Result<OntologyIndex> {
    let format = OntologyFormat::from_path(path)?;
    let file = File::open(path).with_context(|| format!("Failed to open ontology {:?}", path))?;

    tracing::info!(path = %path.display(), ?format, "Parsing ontology");

    let mut builder = IndexBuilder::new();
    read_triples(BufReader::new(file), format, |triple| builder.push(&triple))
        .with_context(|| format!("Failed to parse ontology {:?}", path))?;

    Ok(builder.finish())
}

/// Stream every triple of `reader` into `sink`. Returns the number of
/// triples forwarded.
pub fn read_triples<R, F>(reader: R, format: OntologyFormat, mut sink: F) -> Result<usize>
where
    R: BufRead,
    F: FnMut(OntologyTriple),
{
    let mut count = 0usize;
    let mut forward = |triple: Option<OntologyTriple>| -> Result<(), Infallible> {
        if let Some(triple) = triple {
            count += 1;
            sink(triple);
        }
        Ok(())
    };

    match format {
        OntologyFormat::NTriples => {
            let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| forward(convert_triple(&t)))
                .map_err(|e| anyhow!("failed to parse N-Triples: {e}"))?;
        }
        OntologyFormat::Turtle => {
            let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| forward(convert_triple(&t)))
                .map_err(|e| anyhow!("failed to parse Turtle: {e}"))?;
        }
        OntologyFormat::RdfXml => {
            let mut parser = sophia::xml::parser::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| forward(convert_triple(&t)))
                .map_err(|e| anyhow!("failed to parse RDF/XML: {e}"))?;
        }
    }

    Ok(count)
}

fn convert_triple<T: Triple>(t: &T) -> Option<OntologyTriple> {
    let predicate = t.p().iri()?.as_str().to_string();
    Some(OntologyTriple {
        subject: convert_term(t.s())?,
        predicate,
        object: convert_term(t.o())?,
    })
}

fn convert_term<T: Term>(term: T) -> Option<TripleTerm> {
    match term.kind() {
        TermKind::Iri => term.iri().map(|iri| TripleTerm::Iri(iri.as_str().to_string())),
        TermKind::BlankNode => term
            .bnode_id()
            .map(|id| TripleTerm::BlankNode(id.as_str().to_string())),
        TermKind::Literal => term
            .lexical_form()
            .map(|lexical| TripleTerm::Literal(lexical.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NTRIPLES: &str = r#"
<http://example.org/onto#C1> <http://www.w3.org/2000/01/rdf-schema#label> "BRCA1" .
<http://example.org/onto#C2> <http://www.w3.org/2000/01/rdf-schema#label> "Breast Cancer"@en .
<http://example.org/onto#R108> <http://www.w3.org/2000/01/rdf-schema#label> "Gene_Associated_With_Disease" .
<http://example.org/onto#C1> <http://example.org/onto#R108> <http://example.org/onto#C2> .
_:b0 <http://www.w3.org/2000/01/rdf-schema#label> "anonymous" .
"#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(OntologyFormat::from_path(Path::new("ncit.OWL")).unwrap(), OntologyFormat::RdfXml);
        assert_eq!(OntologyFormat::from_path(Path::new("a.ttl")).unwrap(), OntologyFormat::Turtle);
        assert_eq!(OntologyFormat::from_path(Path::new("a.nt")).unwrap(), OntologyFormat::NTriples);
        assert!(OntologyFormat::from_path(Path::new("a.obo")).is_err());
    }

    #[test]
    fn test_read_ntriples() {
        let mut triples = Vec::new();
        let count = read_triples(NTRIPLES.as_bytes(), OntologyFormat::NTriples, |t| triples.push(t))
            .unwrap();

        assert_eq!(count, 5);
        assert_eq!(triples[1].object, TripleTerm::Literal("Breast Cancer".to_string()));
        assert!(matches!(triples[4].subject, TripleTerm::BlankNode(_)));
    }

    #[test]
    fn test_build_from_turtle_file() {
        let turtle = r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix : <http://example.org/onto#> .

:C3 rdfs:label "Non-Small Cell Lung Carcinoma" ;
    skos:altLabel "NSCLC", "non-small cell lung cancer" .
:C4 rdfs:label "EGFR" ;
    :R130 :C3 .
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mini.ttl");
        std::fs::write(&path, turtle).unwrap();

        let index = build_index_from_file(&path).unwrap();
        assert_eq!(index.concepts_for("nsclc").unwrap(), &["C3".to_string()]);
        assert_eq!(index.concepts_for("non-small cell lung cancer").unwrap(), &["C3".to_string()]);
        assert!(index.relation_codes("C4", "C3").unwrap().contains("R130"));
    }

    #[test]
    fn test_malformed_source_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.nt");
        std::fs::write(&path, "<http://example.org/onto#C1> <http://www.w3.org/2000/01/rdf-schema#label> \"unterminated .\n").unwrap();

        assert!(build_index_from_file(&path).is_err());
    }
}
