use thiserror::Error;

/// Failure reported by a [`crate::resolver::TemplateSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("template `{0}` is not defined by this source")]
    NotFound(String),
    #[error("template source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed template definition: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    /// Whether retrying the same fetch can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Errors produced while resolving a template into pixel-space geometry.
///
/// All variants are scoped to a single template id; other templates keep
/// loading.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{id}` has no inner path")]
    MissingGeometry { id: String },
    #[error("template `{id}` has invalid path data: {reason}")]
    InvalidPath { id: String, reason: String },
    #[error("template `{id}` has invalid dimensions {width_in}in x {height_in}in")]
    InvalidDimensions {
        id: String,
        width_in: f64,
        height_in: f64,
    },
    #[error("template `{id}` not found")]
    NotFound { id: String },
    #[error("template `{id}` could not be fetched: {source}")]
    Source {
        id: String,
        #[source]
        source: SourceError,
    },
    #[error("template `{id}` fetch timed out after {after_ms}ms")]
    Timeout { id: String, after_ms: u64 },
}

impl TemplateError {
    pub fn from_source(id: &str, source: SourceError) -> Self {
        match source {
            SourceError::NotFound(_) => Self::NotFound { id: id.to_string() },
            other => Self::Source {
                id: id.to_string(),
                source: other,
            },
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Source { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Why an image reference could not be loaded for rasterization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageLoadError {
    #[error("unsupported data URI media type `{0}`")]
    UnsupportedMediaType(String),
    #[error("data URI payload could not be decoded: {0}")]
    BadPayload(String),
    #[error("remote image `{0}` cannot be fetched by the offline rasterizer")]
    Remote(String),
    #[error("image file `{0}` does not exist")]
    MissingFile(String),
    #[error("image reference is empty")]
    Empty,
}

/// Per-item export failure. Never aborts sibling items of a batch.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{role} image failed to load: {source}")]
    ImageLoad {
        role: &'static str,
        #[source]
        source: ImageLoadError,
    },
    #[error("rasterization failed: {0}")]
    Rasterize(String),
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error("export cancelled")]
    Cancelled,
    #[error("export sink failed: {0}")]
    Sink(String),
}
