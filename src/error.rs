use thiserror::Error;

/// What a path component is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NodeKind::Group => write!(f, "group"),
            NodeKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// Everything that can go wrong while planning or emitting a file.
///
/// All validation variants are raised before a single byte is emitted, so a
/// failed call leaves the builder exactly as it was.
#[derive(Debug, Error)]
pub enum Hdf5Error {
    #[error("invalid object path {path:?}: {reason}; paths are absolute, '/'-separated, with non-empty segments other than '.' and '..'")]
    InvalidDatasetName { path: String, reason: String },

    #[error("invalid chunk dimensions {chunk_dims:?} for dataset shape {dataset_dims:?}: {reason}; {suggestion:?} would be valid")]
    InvalidChunkDimensions {
        dataset_dims: Vec<u64>,
        chunk_dims: Vec<u64>,
        reason: String,
        suggestion: Vec<u64>,
    },

    #[error("unsupported write datatype: {description}; supported kinds are {supported:?}")]
    UnsupportedWriteDatatype {
        description: String,
        supported: &'static [&'static str],
    },

    #[error("invalid attribute {name:?}: {reason}")]
    AttributeValidation { name: String, reason: String },

    #[error("invalid dataset data (shape {dims:?}): {reason}")]
    DataValidation { dims: Vec<u64>, reason: String },

    #[error("path conflict at {path:?}: already bound as a {existing}, requested as a {requested}; pick a path that does not cross an existing binding")]
    GroupPathConflict {
        path: String,
        existing: NodeKind,
        requested: NodeKind,
    },

    #[error("filter pipeline misconfigured: {reason}")]
    FilterPipelineConfig { reason: String },

    #[error("format version {requested} is out of range; supported versions are 0, 1 and 2")]
    FormatVersionOutOfRange { requested: u32 },

    #[error("failed to write file image: {source}")]
    FileWrite {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Hdf5Error>;

pub const SUPPORTED_ELEMENT_KINDS: &[&str] = &[
    "signed integers (8/16/32/64-bit)",
    "unsigned integers (8/16/32/64-bit)",
    "floats (32/64-bit)",
    "booleans",
    "fixed and variable-length UTF-8 strings",
];
