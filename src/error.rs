use thiserror::Error;

use crate::item::ItemKind;

/// Errors raised by the parsing engine and the item model.
///
/// Malformed section content is never an error: parsers skip what they do not
/// recognise and return `None` when nothing could be extracted.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} has no attribute named '{name}'")]
    InvalidAttribute { kind: ItemKind, name: String },

    #[error("conflicting items: {0}")]
    ConflictingItem(String),

    #[error("invalid value for {kind} attribute '{name}': {source}")]
    InvalidValue {
        kind: ItemKind,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no bugreport text entry in ZIP archive")]
    MissingBugreport,
}

pub type Result<T> = std::result::Result<T, Error>;
