use context_cache::{
    context_dir_for_project_root, default_cache_dir, DiscoveryQuery, CONTENT_CACHE_FILE_NAME,
    DEFAULT_CONTENT_CACHE_MAX_RAW_BYTES, DEFAULT_DISCOVERY_TTL, DISCOVERY_CACHE_FILE_NAME,
};
use context_protocol::DefaultBudgets;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DOCS_DIR_NAME: &str = "docs";
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const ROUTES_DIR_NAME: &str = "routes";
pub const CONTRACTS_DIR_NAME: &str = "contracts";
pub const DESIGN_PROFILE_FILE_NAME: &str = "design-profile.md";
pub const LEDGER_FILE_NAME: &str = "ledger.md";

const DOCUMENT_INCLUDE: &str = "**/*.md";
const DEFAULT_DESIGN_SUMMARY_MAX_LINES: usize = 40;

/// Optional `<root>/.context/config.json`. Every key is optional; relative paths resolve
/// against the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocsConfig {
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,
    #[serde(default)]
    pub state_log: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub discovery_ttl_secs: Option<u64>,
    #[serde(default)]
    pub content_cache_max_raw_bytes: Option<u64>,
    #[serde(default)]
    pub state_window: Option<usize>,
    #[serde(default)]
    pub design_summary_max_lines: Option<usize>,
}

impl DocsConfig {
    #[must_use]
    pub fn path_for_root(root: &Path) -> PathBuf {
        context_dir_for_project_root(root).join(CONFIG_FILE_NAME)
    }

    /// Load the config file. A missing file means defaults; an unreadable one is logged and
    /// also means defaults.
    pub async fn load(root: &Path) -> Self {
        let path = Self::path_for_root(root);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                log::warn!("Failed to read config {}: {err}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Ignoring invalid config {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

/// Resolved locations and limits for one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsLayout {
    pub root: PathBuf,
    pub docs_dir: PathBuf,
    pub state_log: PathBuf,
    pub cache_dir: PathBuf,
    pub discovery_ttl: Duration,
    pub content_cache_max_raw_bytes: u64,
    pub state_window: usize,
    pub design_summary_max_lines: usize,
}

impl DocsLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_config(root, &DocsConfig::default())
    }

    pub fn with_config(root: impl AsRef<Path>, config: &DocsConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        let context_dir = context_dir_for_project_root(&root);
        let resolve = |path: &Option<PathBuf>, default: PathBuf| {
            path.as_ref().map_or(default, |p| root.join(p))
        };
        Self {
            docs_dir: resolve(&config.docs_dir, context_dir.join(DOCS_DIR_NAME)),
            state_log: resolve(
                &config.state_log,
                context_dir.join("state").join("log.jsonl"),
            ),
            cache_dir: resolve(&config.cache_dir, default_cache_dir(&root)),
            discovery_ttl: config
                .discovery_ttl_secs
                .map_or(DEFAULT_DISCOVERY_TTL, Duration::from_secs),
            content_cache_max_raw_bytes: config
                .content_cache_max_raw_bytes
                .unwrap_or(DEFAULT_CONTENT_CACHE_MAX_RAW_BYTES),
            state_window: config
                .state_window
                .unwrap_or(DefaultBudgets::default().state_window),
            design_summary_max_lines: config
                .design_summary_max_lines
                .unwrap_or(DEFAULT_DESIGN_SUMMARY_MAX_LINES),
            root,
        }
    }

    /// Layout for `root` with `<root>/.context/config.json` applied.
    pub async fn resolve(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let config = DocsConfig::load(root).await;
        Self::with_config(root, &config)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.docs_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.docs_dir.join(INDEX_FILE_NAME)
    }

    pub fn routes_dir(&self) -> PathBuf {
        self.docs_dir.join(ROUTES_DIR_NAME)
    }

    pub fn route_file(&self, route: &str, depth: u8) -> PathBuf {
        self.routes_dir()
            .join(route)
            .join(format!("depth-{depth}.md"))
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.docs_dir.join(CONTRACTS_DIR_NAME)
    }

    pub fn contract_file(&self, domain: &str) -> PathBuf {
        self.contracts_dir().join(format!("{domain}.md"))
    }

    pub fn design_profile_path(&self) -> PathBuf {
        self.docs_dir.join(DESIGN_PROFILE_FILE_NAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.docs_dir.join(LEDGER_FILE_NAME)
    }

    pub fn discovery_store_path(&self) -> PathBuf {
        self.cache_dir.join(DISCOVERY_CACHE_FILE_NAME)
    }

    pub fn content_cache_path(&self) -> PathBuf {
        self.cache_dir.join(CONTENT_CACHE_FILE_NAME)
    }

    /// Section documents under the docs dir, excluding the auxiliary inputs that live there.
    pub fn document_query(&self) -> DiscoveryQuery {
        DiscoveryQuery::new(&self.docs_dir, DOCUMENT_INCLUDE).ignoring([
            format!("{ROUTES_DIR_NAME}/**"),
            format!("{CONTRACTS_DIR_NAME}/**"),
            DESIGN_PROFILE_FILE_NAME.to_string(),
            LEDGER_FILE_NAME.to_string(),
        ])
    }
}
