use crate::atomic_io::to_unix_ms;
use crate::paths::relative_display;
use crate::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What a discovery walk is asked to find: files under `root` matching `include`, minus
/// anything matching the ignore set. All patterns are matched against `/`-separated paths
/// relative to `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub root: PathBuf,
    pub include: String,
    pub ignore: BTreeSet<String>,
}

impl DiscoveryQuery {
    pub fn new(root: impl AsRef<Path>, include: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include: include.into(),
            ignore: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn ignoring<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }
}

/// Result of a walk: matching files (relative, sorted) and the mtime of every directory
/// visited, read when the walker yielded the directory and before its children were listed.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<String>,
    pub dirs: BTreeMap<PathBuf, u64>,
}

/// Scanner for documentation files. Unlike a source scanner it does not honor `.gitignore`
/// or skip hidden directories: generated docs usually live in ignored, dot-prefixed trees.
pub struct FileScanner {
    root: PathBuf,
    include: GlobSet,
    ignore: GlobSet,
}

impl FileScanner {
    pub fn new(query: &DiscoveryQuery) -> Result<Self> {
        let mut include = GlobSetBuilder::new();
        include.add(Glob::new(&query.include)?);

        let mut ignore = GlobSetBuilder::new();
        for pattern in &query.ignore {
            ignore.add(Glob::new(pattern)?);
        }

        Ok(Self {
            root: query.root.clone(),
            include: include.build()?,
            ignore: ignore.build()?,
        })
    }

    pub fn scan(&self) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        if !self.root.is_dir() {
            log::debug!("Discovery root {} is not a directory", self.root.display());
            return outcome;
        }

        let root = self.root.clone();
        let ignore = self.ignore.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder.standard_filters(false).follow_links(false);
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !is_dir || entry.path() == root {
                return true;
            }
            !ignore.is_match(relative_display(&root, entry.path()))
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if file_type.is_dir() {
                        match entry.metadata().map(|meta| meta.modified()) {
                            Ok(Ok(mtime)) => {
                                outcome
                                    .dirs
                                    .insert(entry.path().to_path_buf(), to_unix_ms(mtime));
                            }
                            _ => log::debug!("No mtime for {}", entry.path().display()),
                        }
                        continue;
                    }
                    if !file_type.is_file() {
                        continue;
                    }
                    let rel = relative_display(&self.root, entry.path());
                    if !self.include.is_match(&rel) || self.ignore.is_match(&rel) {
                        continue;
                    }
                    outcome.files.push(rel);
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        outcome.files.sort();
        log::debug!(
            "Discovered {} files in {} directories under {}",
            outcome.files.len(),
            outcome.dirs.len(),
            self.root.display()
        );
        outcome
    }
}
