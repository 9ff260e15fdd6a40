//! Field path parsing.
//!
//! Paths address map keys with `/`-separated segments and list elements
//! with `[index]` suffixes: `/a/b`, `/items[0]/name`. The empty path and
//! `"/"` address the record root.

use crate::error::FieldError;

/// One step of a parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Map key lookup.
    Key(String),
    /// List index lookup.
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(k) => write!(f, "/{k}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Parse a field path into segments.
///
/// # Errors
///
/// Returns [`FieldError::InvalidPath`] when the path does not start with
/// `/`, contains an empty segment, or has a malformed index suffix.
pub fn parse(path: &str) -> Result<Vec<PathSegment>, FieldError> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| FieldError::InvalidPath(path.to_string()))?;

    let mut segments = Vec::new();
    for part in rest.split('/') {
        if part.is_empty() {
            return Err(FieldError::InvalidPath(path.to_string()));
        }
        parse_part(part, path, &mut segments)?;
    }
    Ok(segments)
}

/// Parse one `/`-delimited part: a key name followed by zero or more
/// `[index]` suffixes. A part consisting only of suffixes (e.g. `[0]`)
/// indexes directly into the current field.
fn parse_part(
    part: &str,
    full_path: &str,
    segments: &mut Vec<PathSegment>,
) -> Result<(), FieldError> {
    let invalid = || FieldError::InvalidPath(full_path.to_string());

    let (name, mut suffix) = match part.find('[') {
        Some(pos) => (&part[..pos], &part[pos..]),
        None => (part, ""),
    };
    if !name.is_empty() {
        segments.push(PathSegment::Key(name.to_string()));
    } else if suffix.is_empty() {
        return Err(invalid());
    }

    while !suffix.is_empty() {
        let close = suffix.find(']').ok_or_else(invalid)?;
        let index: usize = suffix[1..close].parse().map_err(|_| invalid())?;
        segments.push(PathSegment::Index(index));
        suffix = &suffix[close + 1..];
        if !suffix.is_empty() && !suffix.starts_with('[') {
            return Err(invalid());
        }
    }
    Ok(())
}
