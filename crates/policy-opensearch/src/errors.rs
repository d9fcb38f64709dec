use thiserror::Error;

/// Failures talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),
    #[error("invalid store response: {0}")]
    Decode(String),
    #[error("invalid store address: {0}")]
    Address(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-document decode failures. These never abort a bulk load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document source is not an object")]
    NotAnObject,
    #[error("missing or invalid ptype")]
    MissingPtype,
    #[error("field {field} is not a string")]
    InvalidField { field: String },
    #[error("field {present} is present but {missing} is missing")]
    NonContiguous { missing: String, present: String },
    #[error("document has no rule fields")]
    EmptyRule,
    #[error("ptype {0} does not belong to a known section")]
    UnknownSection(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("policy store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("policy load aborted after {pages_loaded} page(s): {source}")]
    PartialLoad {
        pages_loaded: usize,
        #[source]
        source: StoreError,
    },
    #[error("failed to encode policy document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for AdapterError {
    fn from(err: StoreError) -> Self {
        AdapterError::StoreUnavailable(err)
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
