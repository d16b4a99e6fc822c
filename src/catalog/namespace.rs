/*!
Defining the [Namespace] struct for handling namespaces in the catalog.
*/

use core::fmt::{self, Display};

use itertools::Itertools;

use crate::error::{CatalogError, Result};

/// Separator of different namespace levels.
pub const SEPARATOR: &str = ".";

/// A dotted hierarchical prefix grouping tables and views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    levels: Vec<String>,
}

impl Namespace {
    /// Try to create a namespace from a sequence of level names.
    ///
    /// Every level must be non-empty and must not contain the level
    /// separator, since the dotted form is used as a catalog map key.
    pub fn try_new(levels: &[String]) -> Result<Self> {
        if levels.is_empty() {
            return Err(CatalogError::validation(
                "namespace",
                "namespace must have at least one level",
            ));
        }
        for level in levels {
            if level.is_empty() {
                return Err(CatalogError::validation(
                    "namespace",
                    "namespace level cannot be empty",
                ));
            }
            if level.contains(SEPARATOR) {
                return Err(CatalogError::validation(
                    "namespace",
                    format!("namespace level {level:?} cannot contain {SEPARATOR:?}"),
                ));
            }
        }
        Ok(Namespace {
            levels: levels.to_vec(),
        })
    }

    /// Parse a dotted string into a namespace.
    pub fn parse(namespace: &str) -> Result<Self> {
        let levels = namespace
            .split(SEPARATOR)
            .map(|level| level.to_string())
            .collect::<Vec<String>>();
        Namespace::try_new(&levels)
    }

    /// Get the namespace levels.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Get the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when the namespace has no levels. Kept for completeness; a
    /// constructed namespace always has at least one level.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// True when `self` is a direct child of `parent`.
    pub fn is_child_of(&self, parent: &Namespace) -> bool {
        self.levels.len() == parent.levels.len() + 1
            && self.levels.starts_with(&parent.levels)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.levels.iter().join(SEPARATOR))
    }
}
