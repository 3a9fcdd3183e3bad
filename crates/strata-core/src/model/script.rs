//! Migration script model
//!
//! A script is an immutable `(identifier, body)` pair. The identifier is the
//! ordering key: scripts run in ascending byte order of their identifiers,
//! which is why identifiers carry a sortable numeric prefix
//! (`20240101120000_create_doctors`, `001_create_doctors`).

use crate::checksum::compute_checksum;
use crate::errors::MigrationError;
use std::cmp::Ordering;

/// A named, ordered schema-change script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    id: String,
    body: String,
    checksum: String,
}

impl MigrationScript {
    /// Create a script; the checksum is computed eagerly from the body
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let checksum = compute_checksum(&body);
        Self {
            id: id.into(),
            body,
            checksum,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The literal statements, executed verbatim
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Hex SHA-256 of the body
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// The numeric prefix of the identifier (empty if malformed)
    pub fn prefix(&self) -> &str {
        let end = self
            .id
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// The slug after the numeric prefix and separator
    pub fn slug(&self) -> &str {
        let prefix_len = self.prefix().len();
        self.id
            .get(prefix_len + 1..)
            .unwrap_or_default()
    }
}

impl PartialOrd for MigrationScript {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MigrationScript {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id).then_with(|| self.body.cmp(&other.body))
    }
}

/// Check that an identifier is `<digits>_<slug>`
///
/// The slug may contain ASCII alphanumerics, `_` and `-`.
pub fn validate_identifier(id: &str) -> Result<(), MigrationError> {
    let malformed = |reason: &str| MigrationError::MalformedIdentifier {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    let prefix_len = id.find(|c: char| !c.is_ascii_digit()).unwrap_or(id.len());
    if prefix_len == 0 {
        return Err(malformed("must start with a numeric prefix"));
    }

    let rest = &id[prefix_len..];
    let slug = rest
        .strip_prefix('_')
        .ok_or_else(|| malformed("numeric prefix must be followed by '_'"))?;
    if slug.is_empty() {
        return Err(malformed("missing name after prefix"));
    }
    if let Some(bad) = slug
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(malformed(&format!("invalid character '{}'", bad)));
    }

    Ok(())
}
