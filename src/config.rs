//! Browser configuration.
//!
//! Loaded in three layers: built-in defaults, an optional TOML file, then
//! `KGTK_BROWSER_*` environment variables. The result is validated once.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:5006"
//!
//! [store]
//! graph_cache = "/data/wikidata.sqlite3.db"
//!
//! [browser]
//! id_search_using_in = true
//! sitelink_relationships = ["wikipedia_sitelink"]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assemble::priority::{default_qualifier_order, default_seeds};
use crate::assemble::{AssemblySettings, ItemLimits, QualifierFetch, QualifierPriority, SortMetadata};
use crate::engine::{GraphSchema, DEFAULT_MAX_RESULTS, LANGUAGE_ANY};
use crate::{Error, Result};

const ENV_PREFIX: &str = "KGTK_BROWSER_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub graph: GraphSchema,
    #[serde(default)]
    pub browser: BrowserSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Prefix of the node-data routes, with leading and trailing `/`.
    #[serde(default = "default_service_prefix")]
    pub service_prefix: String,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite graph cache. `:memory:` opens an empty in-memory store.
    #[serde(default = "default_graph_cache")]
    pub graph_cache: PathBuf,

    /// Row cap for queries without an explicit limit.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_true")]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSection {
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Request language meaning "no language filter".
    #[serde(default = "default_language_any")]
    pub language_any: String,

    /// Capacity of every LRU cache.
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    #[serde(default = "default_id_search_threshold")]
    pub id_search_threshold: usize,

    #[serde(default)]
    pub id_search_using_in: bool,

    /// Relationship seeds; a trailing `*` pulls in the subproperty forest.
    #[serde(default = "default_seeds")]
    pub property_priority: Vec<String>,

    #[serde(default = "default_qualifier_order")]
    pub qualifier_priority: Vec<String>,

    #[serde(default = "default_sitelinks")]
    pub sitelink_relationships: Vec<String>,

    #[serde(default)]
    pub sort_metadata: Option<PathBuf>,

    #[serde(default)]
    pub item_defaults: ItemLimits,
}

fn default_listen_addr() -> String {
    "127.0.0.1:5006".to_string()
}

fn default_service_prefix() -> String {
    "/kgtk/browser/backend/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_graph_cache() -> PathBuf {
    PathBuf::from("wikidata.sqlite3.db")
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_language() -> String {
    "en".to_string()
}

fn default_language_any() -> String {
    LANGUAGE_ANY.to_string()
}

fn default_max_cache_size() -> usize {
    1000
}

fn default_id_search_threshold() -> usize {
    QualifierFetch::default().id_search_threshold
}

fn default_sitelinks() -> Vec<String> {
    vec!["wikipedia_sitelink".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            service_prefix: default_service_prefix(),
            enable_cors: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            graph_cache: default_graph_cache(),
            max_results: default_max_results(),
            read_only: true,
        }
    }
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            language_any: default_language_any(),
            max_cache_size: default_max_cache_size(),
            id_search_threshold: default_id_search_threshold(),
            id_search_using_in: false,
            property_priority: default_seeds(),
            qualifier_priority: default_qualifier_order(),
            sitelink_relationships: default_sitelinks(),
            sort_metadata: None,
            item_defaults: ItemLimits::default(),
        }
    }
}

impl BrowserConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Defaults, then `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading configuration");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `KGTK_BROWSER_*` variables found by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("LISTEN_ADDR") {
            self.server.listen_addr = v;
        }
        if let Some(v) = var("SERVICE_PREFIX") {
            self.server.service_prefix = v;
        }
        if let Some(v) = var("ENABLE_CORS") {
            self.server.enable_cors = parse_env("ENABLE_CORS", &v)?;
        }
        if let Some(v) = var("GRAPH_CACHE") {
            self.store.graph_cache = PathBuf::from(v);
        }
        if let Some(v) = var("MAX_RESULTS") {
            self.store.max_results = parse_env("MAX_RESULTS", &v)?;
        }
        if let Some(v) = var("READ_ONLY") {
            self.store.read_only = parse_env("READ_ONLY", &v)?;
        }
        if let Some(v) = var("DEFAULT_LANGUAGE") {
            self.browser.default_language = v;
        }
        if let Some(v) = var("MAX_CACHE_SIZE") {
            self.browser.max_cache_size = parse_env("MAX_CACHE_SIZE", &v)?;
        }
        if let Some(v) = var("ID_SEARCH_THRESHOLD") {
            self.browser.id_search_threshold = parse_env("ID_SEARCH_THRESHOLD", &v)?;
        }
        if let Some(v) = var("ID_SEARCH_USING_IN") {
            self.browser.id_search_using_in = parse_env("ID_SEARCH_USING_IN", &v)?;
        }
        if let Some(v) = var("SORT_METADATA") {
            self.browser.sort_metadata = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        let prefix = &self.server.service_prefix;
        if !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(Error::Config(format!(
                "service_prefix '{prefix}' must start and end with '/'"
            )));
        }
        if self.store.max_results == 0 {
            return Err(Error::Config("max_results must be positive".into()));
        }
        if self.browser.default_language.is_empty() || self.browser.language_any.is_empty() {
            return Err(Error::Config("language codes must not be empty".into()));
        }
        self.graph.validate()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| Error::Config(format!("listen_addr '{}': {e}", self.server.listen_addr)))
    }

    /// Assembly settings, reading the sort metadata file if one is named.
    pub fn assembly_settings(&self) -> Result<AssemblySettings> {
        let b = &self.browser;
        let sort_metadata = match &b.sort_metadata {
            Some(path) => Some(SortMetadata::load(path)?),
            None => None,
        };
        Ok(AssemblySettings {
            qualifier_priority: QualifierPriority::new(&b.qualifier_priority),
            qualifier_fetch: QualifierFetch {
                id_search_threshold: b.id_search_threshold,
                id_search_using_in: b.id_search_using_in,
            },
            sitelinks: b.sitelink_relationships.clone(),
            sort_metadata,
        })
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{ENV_PREFIX}{name}='{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BrowserConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:5006");
        assert_eq!(config.store.max_results, 10_000);
        assert_eq!(config.browser.id_search_threshold, 40);
        assert_eq!(config.browser.item_defaults.valuelist_max_len, 20);
        assert_eq!(config.graph.edges_table, "claims");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BrowserConfig::from_toml(
            r#"
            [store]
            graph_cache = "/tmp/graph.db"

            [graph]
            image_label = "P154"

            [browser.item_defaults]
            proplist_max_len = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.store.graph_cache, PathBuf::from("/tmp/graph.db"));
        assert!(config.store.read_only);
        assert_eq!(config.graph.image_label, "P154");
        assert_eq!(config.graph.label_label, "label");
        assert_eq!(config.browser.item_defaults.proplist_max_len, 5);
        assert_eq!(config.browser.item_defaults.query_limit, 300_000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KGTK_BROWSER_LISTEN_ADDR", "0.0.0.0:8080"),
            ("KGTK_BROWSER_ID_SEARCH_USING_IN", "true"),
            ("KGTK_BROWSER_MAX_RESULTS", "25"),
        ]
        .into_iter()
        .collect();
        let mut config = BrowserConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert!(config.browser.id_search_using_in);
        assert_eq!(config.store.max_results, 25);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = BrowserConfig::default();
        let err = config
            .apply_env(|k| (k == "KGTK_BROWSER_MAX_RESULTS").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BrowserConfig::default();
        config.server.service_prefix = "kgtk".into();
        assert!(config.validate().is_err());

        let mut config = BrowserConfig::default();
        config.graph.labels_table = "labels x".into();
        assert!(config.validate().is_err());

        let mut config = BrowserConfig::default();
        config.server.listen_addr = "nowhere".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_with_sort_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("sort.json");
        std::fs::write(&meta, r#"{"P1082": {"sort_by": "desc", "qualifier": "P585"}}"#).unwrap();

        let path = dir.path().join("browser.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[browser]\nsort_metadata = {:?}", meta.display().to_string()).unwrap();

        let config = BrowserConfig::from_file(&path).unwrap();
        let settings = config.assembly_settings().unwrap();
        assert_eq!(settings.sort_metadata.unwrap().len(), 1);
        assert_eq!(settings.sitelinks, vec!["wikipedia_sitelink"]);
    }
}
