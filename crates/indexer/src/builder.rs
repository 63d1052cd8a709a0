use crate::error::{IndexerError, Result, StructuralError};
use crate::index::{IndexedDocument, SectionIndex, UpstreamPresence};
use crate::layout::DocsLayout;
use crate::manifest::SectionManifest;
use crate::markers::{count_markers, parse_sections};
use crate::section::{content_hash, Section};
use crate::stats::IndexStats;
use context_cache::{
    relative_display, scan_files, unix_now_ms, ContentCache, DiscoveryCache, ScanLimiter,
    ScannedFile, StructuredCache, CONTENT_CACHE_COMPRESS_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What the content cache remembers about a document between builds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentDigest {
    pub content_hash: String,
    pub line_count: usize,
    pub marker_count: usize,
}

impl DocumentDigest {
    pub fn of(text: &str) -> Self {
        Self {
            content_hash: content_hash(text),
            line_count: text.lines().count(),
            marker_count: count_markers(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub index_path: PathBuf,
    pub index: SectionIndex,
    pub stats: IndexStats,
}

/// Builds `index.json` for one docs layout.
///
/// Caches are loaded once per build and persisted once at the end, after the index itself.
pub struct DocsIndexer {
    layout: DocsLayout,
    limiter: ScanLimiter,
}

impl DocsIndexer {
    pub fn new(layout: DocsLayout) -> Result<Self> {
        if !layout.root.exists() {
            return Err(IndexerError::InvalidPath(format!(
                "Path does not exist: {}",
                layout.root.display()
            )));
        }
        Ok(Self {
            layout,
            limiter: ScanLimiter::from_env(),
        })
    }

    #[must_use]
    pub fn with_limiter(mut self, limiter: ScanLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn layout(&self) -> &DocsLayout {
        &self.layout
    }

    pub async fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let layout = &self.layout;
        let manifest = SectionManifest::load(&layout.manifest_path()).await?;
        log::debug!(
            "Manifest declares {} sections across {} documents",
            manifest.declared_ids(),
            manifest.documents.len()
        );

        let mut discovery = DiscoveryCache::load(layout.discovery_store_path()).await;
        let discovered = discovery
            .discover(&layout.document_query(), layout.discovery_ttl)
            .await?;

        let content_store =
            StructuredCache::new(layout.content_cache_path(), CONTENT_CACHE_COMPRESS_THRESHOLD);
        let mut content: ContentCache<DocumentDigest> =
            ContentCache::load(content_store, layout.content_cache_max_raw_bytes).await;
        let scanned = scan_files(
            &layout.docs_dir,
            &discovered,
            &mut content,
            &self.limiter,
            |_, raw| DocumentDigest::of(raw),
        )
        .await;
        let reused_documents = scanned.iter().filter(|file| file.reused).count();
        let scanned: BTreeMap<String, ScannedFile<DocumentDigest>> = scanned
            .into_iter()
            .map(|file| (file.rel_path.clone(), file))
            .collect();

        let mut index = SectionIndex::new(unix_now_ms());
        let mut first_seen: HashMap<String, (String, usize)> = HashMap::new();

        for rel in documents_to_parse(&manifest, &scanned) {
            let declared = manifest.ids_for(&rel);
            let source = relative_display(&layout.root, &layout.docs_dir.join(&rel));
            let Some(text) = self.document_text(&rel, scanned.get(&rel)).await? else {
                if let Some(id) = declared.first() {
                    return Err(StructuralError::MissingSection {
                        document: source,
                        id: id.clone(),
                    }
                    .into());
                }
                log::warn!("{source}: listed in the manifest but not found");
                continue;
            };
            if !manifest.documents.contains_key(&rel) {
                log::warn!("{source}: has section markers but no manifest entry");
            }

            let sections = parse_sections(&source, &text, declared)?;
            claim_ids(&mut first_seen, &source, &sections)?;
            index.documents.push(IndexedDocument {
                path: source,
                content_hash: content_hash(&text),
                sections: sections.len(),
            });
            index.sections.extend(sections);
        }

        index.upstream = UpstreamPresence {
            routes: exists(&layout.routes_dir()).await,
            contracts: exists(&layout.contracts_dir()).await,
            design_profile: exists(&layout.design_profile_path()).await,
            ledger: exists(&layout.ledger_path()).await,
            state_log: exists(&layout.state_log).await,
        };

        let index_path = layout.index_path();
        index.save(&index_path).await?;

        let active: BTreeSet<String> = scanned.keys().cloned().collect();
        content.prune(&active);
        content.persist().await;
        discovery.persist().await;

        let mut stats = IndexStats::from_index(&index);
        stats.reused_documents = reused_documents;
        stats.time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Indexed {} sections from {} documents in {}ms",
            stats.sections,
            stats.documents,
            stats.time_ms
        );

        Ok(BuildReport {
            index_path,
            index,
            stats,
        })
    }

    /// Text of a document: retained raw text when the scan has it, otherwise a fresh read.
    /// `Ok(None)` means the document does not exist.
    async fn document_text(
        &self,
        rel: &str,
        scanned: Option<&ScannedFile<DocumentDigest>>,
    ) -> Result<Option<String>> {
        if let Some(raw) = scanned.and_then(|file| file.raw.clone()) {
            return Ok(Some(raw));
        }
        match tokio::fs::read_to_string(self.layout.docs_dir.join(rel)).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Build the index for `layout` with the default scan limiter.
pub async fn build_index(layout: &DocsLayout) -> Result<BuildReport> {
    DocsIndexer::new(layout.clone())?.build().await
}

/// Manifest documents first (in key order), then any other discovered document that carries
/// markers.
fn documents_to_parse(
    manifest: &SectionManifest,
    scanned: &BTreeMap<String, ScannedFile<DocumentDigest>>,
) -> Vec<String> {
    let mut docs: Vec<String> = manifest.documents.keys().cloned().collect();
    docs.extend(
        scanned
            .iter()
            .filter(|(rel, file)| {
                file.derived.marker_count > 0 && !manifest.documents.contains_key(*rel)
            })
            .map(|(rel, _)| rel.clone()),
    );
    docs
}

fn claim_ids(
    first_seen: &mut HashMap<String, (String, usize)>,
    source: &str,
    sections: &[Section],
) -> std::result::Result<(), StructuralError> {
    for section in sections {
        if let Some((first_source, first_line)) = first_seen.get(&section.id) {
            return Err(StructuralError::DuplicateId {
                document: format!("{first_source} and {source}"),
                id: section.id.clone(),
                first_line: *first_line,
                second_line: section.start_line,
            });
        }
        first_seen.insert(
            section.id.clone(),
            (source.to_string(), section.start_line),
        );
    }
    Ok(())
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
