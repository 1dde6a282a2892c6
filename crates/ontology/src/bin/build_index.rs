use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "data/ontology_index.bin";

/// Build the ontology label and relation index from an RDF source.
#[derive(Debug, Parser)]
#[command(name = "build_index", version)]
struct Args {
    /// Ontology file (.owl, .rdf, .xml, .ttl or .nt)
    source: PathBuf,

    /// Where to write the index artifact
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("=== Ontology Index Build ===\n");

    let started = Instant::now();
    let index = ontology::build_index_from_file(&args.source)?;
    let stats = index.stats();

    index.save(&args.output)?;

    println!("  Labels indexed:      {}", stats.labels);
    println!("  Concept pairs:       {}", stats.concept_pairs);
    println!("  Labelled predicates: {}", stats.predicates_labelled);
    println!("  Elapsed:             {:.1}s", started.elapsed().as_secs_f64());
    println!("\n✅ Index saved to {}", args.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_output_defaults() {
        let args = Args::try_parse_from(["build_index", "ncit.owl"]).unwrap();
        assert_eq!(args.source, PathBuf::from("ncit.owl"));
        assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn test_extra_arguments_are_rejected() {
        assert!(Args::try_parse_from(["build_index"]).is_err());
        assert!(Args::try_parse_from(["build_index", "a.owl", "b.bin", "c"]).is_err());

        let help = Args::try_parse_from(["build_index", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
