/*!
Defining the [Identifier] struct for identifying tables and views in the catalog.
*/

use core::fmt::{self, Display};

use lazy_static::lazy_static;
use regex::Regex;

use super::namespace::{Namespace, SEPARATOR};
use crate::error::{CatalogError, Result};

lazy_static! {
    static ref INVALID_LEAF_CHARS: Regex = Regex::new(r#"[/\\:*?"<>|]"#).unwrap();
}

/// Identifies a table or view in the catalog. The prefix of the name parts is
/// the namespace, the last part is the leaf name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    namespace: Namespace,
    name: String,
}

impl Identifier {
    /// Create an identifier from its ordered name parts. At least two parts
    /// are required: a namespace prefix and a leaf name.
    pub fn try_new(parts: &[String]) -> Result<Self> {
        if parts.len() < 2 {
            return Err(CatalogError::validation(
                "identifier",
                "identifier requires a namespace and a name",
            ));
        }
        let name = &parts[parts.len() - 1];
        if name.is_empty() {
            return Err(CatalogError::validation("identifier", "name cannot be empty"));
        }
        if let Some(found) = INVALID_LEAF_CHARS.find(name) {
            return Err(CatalogError::validation(
                "identifier",
                format!("name cannot contain {:?}", found.as_str()),
            ));
        }
        Ok(Identifier {
            namespace: Namespace::try_new(&parts[0..parts.len() - 1])?,
            name: name.clone(),
        })
    }

    /// Parse a dotted string into an identifier.
    pub fn parse(identifier: &str) -> Result<Self> {
        let parts = identifier
            .split(SEPARATOR)
            .map(|part| part.to_string())
            .collect::<Vec<String>>();
        Identifier::try_new(&parts)
    }

    /// Build an identifier from an existing namespace and a leaf name.
    pub fn from_namespace(namespace: Namespace, name: &str) -> Result<Self> {
        let mut parts = namespace.levels().to_vec();
        parts.push(name.to_string());
        Identifier::try_new(&parts)
    }

    /// Return the namespace of the identifier.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Return the leaf name of the identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dotted form used as the catalog map key.
    pub fn key(&self) -> String {
        format!("{}", self)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, SEPARATOR, self.name)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::Identifier;

    #[test]
    fn test_new() {
        let identifier = Identifier::try_new(&[
            "level1".to_string(),
            "level2".to_string(),
            "table".to_string(),
        ])
        .unwrap();
        assert_eq!(&format!("{}", identifier), "level1.level2.table");
        assert_eq!("table", identifier.name());
        assert_eq!("level1.level2", format!("{}", identifier.namespace()));
    }

    #[test]
    fn test_empty_name() {
        assert!(Identifier::try_new(&["level1".to_string(), "".to_string()]).is_err());
    }

    #[test]
    fn test_missing_namespace() {
        assert!(Identifier::try_new(&["table".to_string()]).is_err());
    }

    #[test]
    fn test_invalid_name_characters() {
        for name in ["a/b", "a\\b", "a:b", "a*b", "a?b", "a\"b", "a<b", "a>b", "a|b"] {
            assert!(
                Identifier::try_new(&["ns".to_string(), name.to_string()]).is_err(),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse() {
        let identifier = Identifier::parse("level1.level2.table").unwrap();
        assert_eq!(&format!("{}", identifier), "level1.level2.table");
    }

    proptest! {
        #[test]
        fn test_parse_display_round_trip(
            parts in proptest::collection::vec("[a-z][a-z0-9_]{0,12}", 2..5)
        ) {
            let identifier = Identifier::try_new(&parts).unwrap();
            let reparsed = Identifier::parse(&identifier.key()).unwrap();
            prop_assert_eq!(identifier, reparsed);
        }
    }
}
