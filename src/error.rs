/// Error taxonomy for a conversion
///
/// Malformed Markdown is never an error: every line falls through to some
/// interpretation. Errors are reserved for structural invariant violations,
/// I/O failures, and user-callback failures.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The block parser reached an inconsistent open-block stack. Fatal;
    /// carries a description of the offending block for diagnostics.
    #[error("block parser invariant violated: {detail}")]
    Invariant { detail: String },

    /// I/O failure reading source or writing output, propagated unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The user-supplied URL resolver callback failed.
    #[error("URL resolver failed for {url:?}: {message}")]
    UrlResolver { url: String, message: String },

    /// A user-supplied visitor callback failed during rendering.
    #[error("custom visitor failed: {message}")]
    Visitor { message: String },
}

impl Error {
    pub(crate) fn invariant(detail: impl Into<String>) -> Self {
        Error::Invariant {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
