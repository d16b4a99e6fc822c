/*!
 * defines the [CatalogError] and [Result] types.
*/

use core::fmt;

use thiserror::Error;

/// The kind of catalog entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A namespace entry.
    Namespace,
    /// A table entry.
    Table,
    /// A view entry.
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Namespace => write!(f, "namespace"),
            EntityKind::Table => write!(f, "table"),
            EntityKind::View => write!(f, "view"),
        }
    }
}

/// Catalog error type. Clients match on the variant, not the message.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The namespace is not present in the catalog.
    #[error("namespace {0} does not exist")]
    NoSuchNamespace(String),
    /// The table is not present in the catalog.
    #[error("table {0} does not exist")]
    NoSuchTable(String),
    /// The view is not present in the catalog.
    #[error("view {0} does not exist")]
    NoSuchView(String),
    /// A namespace, table or view with the same name is already registered.
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Which kind of entity collided.
        kind: EntityKind,
        /// Dotted name of the colliding entity.
        name: String,
    },
    /// The namespace still holds tables or views.
    #[error("namespace {0} is not empty")]
    NamespaceNotEmpty(String),
    /// An identifier, property or schema failed validation at the API boundary.
    #[error("invalid {field}: {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// What was wrong with it.
        message: String,
    },
    /// The optimistic concurrency check failed; the catalog changed under us.
    #[error("catalog changed concurrently (expected tag {expected}, found {actual})")]
    ConcurrentModification {
        /// The version tag the writer observed at read time.
        expected: String,
        /// The version tag currently on disk.
        actual: String,
    },
    /// A commit precondition did not hold against the current metadata.
    #[error("commit requirement {0} failed")]
    RequirementFailed(String),
    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,
    /// An underlying filesystem failure.
    #[error("io failure")]
    Io(#[from] std::io::Error),
    /// An underlying database failure.
    #[error("database failure")]
    Sql(#[from] rusqlite::Error),
    /// A document could not be encoded or decoded.
    #[error("document serialization failed")]
    Serde(#[from] serde_json::Error),
    /// An invariant violation discovered during validation.
    #[error("{0}")]
    Internal(String),
}

impl CatalogError {
    /// Shorthand for a [CatalogError::Validation] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Catalog result type
pub type Result<T> = std::result::Result<T, CatalogError>;
