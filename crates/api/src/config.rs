use anyhow::{Context, Result};
use graph::{ConceptIdPolicy, MergeOptions};
use grounding::ResolveOptions;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub graph: GraphConfig,
    pub index_path: PathBuf,
    /// Root for every file path a client names (inputs, outputs, reloads).
    pub data_dir: PathBuf,
    pub resolver: ResolveOptions,
    pub merge: MergeOptions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,  // Persistent store addressed by NEO4J_URI
    Memory, // In-process store, lost on shutdown
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub uri: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            graph: GraphConfig {
                backend: GraphBackend::Neo4j,
                uri: "bolt://localhost:7687".to_string(),
                username: "neo4j".to_string(),
                password: String::new(),
            },
            index_path: PathBuf::from("data/ontology_index.bin"),
            data_dir: PathBuf::from("data"),
            resolver: ResolveOptions::default(),
            merge: MergeOptions::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment, after loading a
    /// `.env` file when one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::info!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(backend) = lookup("GRAPH_BACKEND") {
            config.graph.backend = match backend.to_lowercase().as_str() {
                "neo4j" => GraphBackend::Neo4j,
                "memory" => GraphBackend::Memory,
                other => anyhow::bail!("GRAPH_BACKEND must be 'neo4j' or 'memory', got '{}'", other),
            };
        }
        if let Some(uri) = lookup("NEO4J_URI") {
            config.graph.uri = uri;
        }
        if let Some(username) = lookup("NEO4J_USERNAME") {
            config.graph.username = username;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            config.graph.password = password;
        }
        if let Some(path) = lookup("ONTOLOGY_INDEX_PATH") {
            config.index_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(fuzzy) = lookup("FUZZY_MATCHING") {
            config.resolver.fuzzy = parse_bool(&fuzzy).context("Invalid FUZZY_MATCHING")?;
        }
        if let Some(threshold) = lookup("FUZZY_THRESHOLD") {
            let threshold: f64 = threshold
                .trim()
                .parse()
                .context(format!("Invalid FUZZY_THRESHOLD: {}", threshold))?;
            if !(0.0..=100.0).contains(&threshold) {
                anyhow::bail!("FUZZY_THRESHOLD must be within 0-100, got {}", threshold);
            }
            config.resolver.threshold = threshold;
        }
        if let Some(policy) = lookup("CONCEPT_ID_POLICY") {
            config.merge.concept_ids = match policy.to_lowercase().as_str() {
                "replace" => ConceptIdPolicy::Replace,
                "union" => ConceptIdPolicy::Union,
                other => anyhow::bail!("CONCEPT_ID_POLICY must be 'replace' or 'union', got '{}'", other),
            };
        }

        if config.graph.backend == GraphBackend::Neo4j && config.graph.password.is_empty() {
            tracing::warn!("NEO4J_PASSWORD is not set");
        }

        Ok(config)
    }

    /// Resolve a client-supplied relative path under `data_dir`.
    ///
    /// Absolute paths and `..` components are rejected.
    pub fn data_path(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if relative.trim().is_empty() {
            anyhow::bail!("path must not be empty");
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => anyhow::bail!("path must stay inside the data directory: {}", relative),
            }
        }
        Ok(self.data_dir.join(path))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}
