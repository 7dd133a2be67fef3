use std::fmt;
use std::io;

/// Failure to produce a usable fragment tree for a referenced path.
#[derive(Debug)]
pub enum ResolveError {
    /// No file was found for the referenced path.
    FragmentNotFound(String),
    /// The file exists but could not be read.
    Io { path: String, source: io::Error },
    /// The file was read but its tree could not be parsed.
    Parse { path: String, messages: Vec<String> },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::FragmentNotFound(path) => {
                write!(f, "fragment file '{}' not found", path)
            }
            ResolveError::Io { path, source } => {
                write!(f, "cannot read fragment '{}': {}", path, source)
            }
            ResolveError::Parse { path, messages } => {
                write!(f, "parse errors in fragment '{}': {}", path, messages.join(", "))
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
