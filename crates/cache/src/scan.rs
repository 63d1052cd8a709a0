use crate::atomic_io::to_unix_ms;
use crate::content::{ContentCache, ContentCacheEntry};
use crate::limits::ScanLimiter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// One file as seen by a cached scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile<D> {
    pub rel_path: String,
    pub size: u64,
    pub mtime_ms: u64,
    pub derived: D,
    /// Raw text when it was read in this scan or is still retained by the cache.
    pub raw: Option<String>,
    /// True when the cached derived result was reused without reading the file.
    pub reused: bool,
}

enum Probe<D> {
    Reused {
        idx: usize,
        size: u64,
        mtime_ms: u64,
    },
    Fresh {
        idx: usize,
        size: u64,
        mtime_ms: u64,
        derived: D,
        raw: String,
    },
    Skipped,
}

/// Stat every file in `rel_paths` (relative to `root`), reusing cached derived results whose
/// `(size, mtime)` signature still matches and reading + deriving the rest.
///
/// At most `limiter.limit()` stats/reads are in flight. A file that fails to stat or read is
/// skipped; the batch always completes. Results keep the order of `rel_paths`.
pub async fn scan_files<D, F>(
    root: &Path,
    rel_paths: &[String],
    cache: &mut ContentCache<D>,
    limiter: &ScanLimiter,
    derive: F,
) -> Vec<ScannedFile<D>>
where
    D: Serialize + DeserializeOwned + Clone + Send + 'static,
    F: Fn(&str, &str) -> D + Send + Sync + 'static,
{
    let derive = Arc::new(derive);
    let mut tasks = JoinSet::new();

    for (idx, rel) in rel_paths.iter().enumerate() {
        let signature = cache.get(rel).map(|entry| (entry.size, entry.mtime_ms));
        let path: PathBuf = root.join(rel);
        let rel = rel.clone();
        let limiter = limiter.clone();
        let derive = derive.clone();
        tasks.spawn(async move {
            let _permit = limiter.acquire().await;
            probe_file(idx, &rel, &path, signature, derive.as_ref()).await
        });
    }

    let mut slots: Vec<Option<ScannedFile<D>>> = vec![None; rel_paths.len()];
    while let Some(joined) = tasks.join_next().await {
        let probe = match joined {
            Ok(probe) => probe,
            Err(err) => {
                log::debug!("Scan task failed: {err}");
                continue;
            }
        };
        match probe {
            Probe::Reused {
                idx,
                size,
                mtime_ms,
            } => {
                let rel = &rel_paths[idx];
                if let Some(entry) = cache.get(rel) {
                    slots[idx] = Some(ScannedFile {
                        rel_path: rel.clone(),
                        size,
                        mtime_ms,
                        derived: entry.derived.clone(),
                        raw: entry.raw.clone(),
                        reused: true,
                    });
                }
            }
            Probe::Fresh {
                idx,
                size,
                mtime_ms,
                derived,
                raw,
            } => {
                let rel = rel_paths[idx].clone();
                cache.insert(
                    rel.clone(),
                    ContentCacheEntry {
                        size,
                        mtime_ms,
                        derived: derived.clone(),
                        raw: Some(raw.clone()),
                    },
                );
                slots[idx] = Some(ScannedFile {
                    rel_path: rel,
                    size,
                    mtime_ms,
                    derived,
                    raw: Some(raw),
                    reused: false,
                });
            }
            Probe::Skipped => {}
        }
    }

    let scanned: Vec<ScannedFile<D>> = slots.into_iter().flatten().collect();
    log::debug!(
        "Scanned {} files ({} reused from cache)",
        scanned.len(),
        scanned.iter().filter(|f| f.reused).count()
    );
    scanned
}

async fn probe_file<D, F>(
    idx: usize,
    rel: &str,
    path: &Path,
    signature: Option<(u64, u64)>,
    derive: &F,
) -> Probe<D>
where
    F: Fn(&str, &str) -> D,
{
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(err) => {
            log::debug!("Skipping {}: stat failed: {err}", path.display());
            return Probe::Skipped;
        }
    };
    let size = meta.len();
    let mtime_ms = meta.modified().map(to_unix_ms).unwrap_or(0);
    if signature == Some((size, mtime_ms)) {
        return Probe::Reused {
            idx,
            size,
            mtime_ms,
        };
    }

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) => {
            log::debug!("Skipping {}: read failed: {err}", path.display());
            return Probe::Skipped;
        }
    };
    let derived = derive(rel, &raw);
    Probe::Fresh {
        idx,
        size,
        mtime_ms,
        derived,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::StructuredCache;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn new_cache(dir: &Path) -> ContentCache<usize> {
        ContentCache::new(StructuredCache::new(dir.join("content.json"), 1 << 20), 1 << 20)
    }

    #[tokio::test]
    async fn second_scan_reuses_unchanged_files() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.md"), "one two").unwrap();
        std::fs::write(temp.path().join("b.md"), "three").unwrap();
        let paths = vec!["a.md".to_string(), "b.md".to_string()];
        let mut cache = new_cache(temp.path());
        let limiter = ScanLimiter::new(4);

        let first = scan_files(temp.path(), &paths, &mut cache, &limiter, |_, raw| raw.len()).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|f| !f.reused));

        let second =
            scan_files(temp.path(), &paths, &mut cache, &limiter, |_, _| usize::MAX).await;
        assert!(second.iter().all(|f| f.reused));
        assert_eq!(second[0].derived, 7);
        assert_eq!(second[1].derived, 5);
        assert_eq!(second[0].rel_path, "a.md");
    }

    #[tokio::test]
    async fn missing_files_are_skipped_without_aborting() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.md"), "x").unwrap();
        let paths = vec!["missing.md".to_string(), "a.md".to_string()];
        let mut cache = new_cache(temp.path());

        let scanned = scan_files(
            temp.path(),
            &paths,
            &mut cache,
            &ScanLimiter::new(2),
            |_, raw| raw.len(),
        )
        .await;

        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].rel_path, "a.md");
    }

    #[tokio::test]
    async fn in_flight_reads_never_exceed_limit() {
        let temp = tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..40 {
            let name = format!("f{i:02}.md");
            std::fs::write(temp.path().join(&name), "body").unwrap();
            paths.push(name);
        }
        let mut cache = new_cache(temp.path());
        let limiter = ScanLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (c, p) = (current.clone(), peak.clone());
        let scanned = scan_files(temp.path(), &paths, &mut cache, &limiter, move |_, raw| {
            let now = c.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            c.fetch_sub(1, Ordering::SeqCst);
            raw.len()
        })
        .await;

        assert_eq!(scanned.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
