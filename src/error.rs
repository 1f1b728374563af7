use std::fmt;

/// Fatal conditions: the input document is left untouched and no output
/// is produced.
#[derive(Debug)]
pub enum Error {
    /// The requested format is outside the supported set, or the file
    /// uses a profile of it the engine does not read.
    UnsupportedFormat(String),
    /// The file does not parse as its declared format.
    MalformedDocument(String),
    /// The rewritten document could not be re-serialized.
    Serialization(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFormat(msg) => write!(f, "unsupported format: {msg}"),
            Error::MalformedDocument(msg) => write!(f, "malformed document: {msg}"),
            Error::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::MalformedDocument(format!("invalid XML: {e}"))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::MalformedDocument(format!("invalid archive: {e}"))
    }
}
