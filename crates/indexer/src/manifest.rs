use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Declared section ids per document, keyed by path relative to the docs directory.
///
/// ```json
/// {"documents": {"architecture.md": ["overview", "auth-flow"]}}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionManifest {
    #[serde(default)]
    pub documents: BTreeMap<String, Vec<String>>,
}

impl SectionManifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexerError::ManifestMissing(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn ids_for(&self, document: &str) -> &[String] {
        self.documents
            .get(document)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn declared_ids(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_manifest_and_reports_missing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("manifest.json");
        assert!(matches!(
            SectionManifest::load(&path).await,
            Err(IndexerError::ManifestMissing(_))
        ));

        std::fs::write(&path, r#"{"documents": {"arch.md": ["a", "b"]}}"#).unwrap();
        let manifest = SectionManifest::load(&path).await.unwrap();
        assert_eq!(manifest.ids_for("arch.md"), ["a".to_string(), "b".to_string()]);
        assert!(manifest.ids_for("other.md").is_empty());
        assert_eq!(manifest.declared_ids(), 2);
    }
}
