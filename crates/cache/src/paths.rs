use std::path::{Path, PathBuf};

pub const CONTEXT_DIR_NAME: &str = ".context";
pub const CACHE_DIR_NAME: &str = "cache";

pub const DISCOVERY_CACHE_FILE_NAME: &str = "file-discovery.json";
pub const CONTENT_CACHE_FILE_NAME: &str = "content-cache.json";

#[must_use]
pub fn context_dir_for_project_root(root: &Path) -> PathBuf {
    root.join(CONTEXT_DIR_NAME)
}

#[must_use]
pub fn default_cache_dir(root: &Path) -> PathBuf {
    context_dir_for_project_root(root).join(CACHE_DIR_NAME)
}

/// Render a path relative to `root` with `/` separators, as stored in caches and indexes.
#[must_use]
pub fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if let std::path::Component::Normal(name) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&name.to_string_lossy());
        }
    }
    out
}
