use thiserror::Error;

/// Errors surfaced to callers of the synchronization layer.
///
/// Missing metadata, unregistrable frame pairs and stale transforms are not
/// errors; they resolve to `None` and propagation continues uncorrected.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("at least one of rendering engine id, group id or viewport id must be given")]
    MissingScope,

    #[error("a synchronizer with id '{0}' already exists")]
    DuplicateSynchronizer(String),

    #[error("no synchronizer with id '{0}'")]
    UnknownSynchronizer(String),

    #[error("viewport '{0}' could not be resolved")]
    UnresolvedViewportId(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),

    #[error("invalid metadata document: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
