use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

/// A manifest/document divergence. These are build defects: the indexer refuses to produce an
/// index rather than routing around them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{document}: section `{id}` is declared in the manifest but has no marker pair")]
    MissingSection { document: String, id: String },

    #[error("{document}: section id `{id}` appears twice (lines {first_line} and {second_line})")]
    DuplicateId {
        document: String,
        id: String,
        first_line: usize,
        second_line: usize,
    },

    #[error("{document}: section `{id}` ends on line {end_line} before it starts on line {start_line}")]
    InvertedRange {
        document: String,
        id: String,
        start_line: usize,
        end_line: usize,
    },

    #[error("{document}: section `{id}` opened on line {line} is never closed")]
    UnclosedSection {
        document: String,
        id: String,
        line: usize,
    },

    #[error("{document}: end marker for `{id}` on line {line} has no start marker")]
    UnpairedEnd {
        document: String,
        id: String,
        line: usize,
    },

    #[error("{document}: section `{inner}` (line {line}) starts inside section `{outer}`")]
    NestedSection {
        document: String,
        outer: String,
        inner: String,
        line: usize,
    },

    #[error("{document}:{line}: malformed section marker: {reason}")]
    MalformedMarker {
        document: String,
        line: usize,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cache error: {0}")]
    CacheError(#[from] context_cache::CacheError),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Index not found at {0}")]
    IndexMissing(PathBuf),

    #[error("Manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
