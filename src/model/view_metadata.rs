/*!
Defines the view metadata document. Unlike tables, a view's history is kept
inside the document itself as a list of [ViewVersion]s.
*/
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

use crate::catalog::namespace::Namespace;
use crate::model::schema::Schema;
use crate::util::timestamp_ms;

/// Format version of a view metadata document. Only version 1 exists.
#[derive(Debug, Serialize_repr, Deserialize_repr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum ViewFormatVersion {
    /// The first version of the view format.
    V1 = 1,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// The metadata document for a view.
pub struct ViewMetadata {
    /// Integer version of the view format.
    pub format_version: ViewFormatVersion,
    /// A UUID that identifies the view.
    pub view_uuid: Uuid,
    /// The view's base location.
    pub location: String,
    /// A list of schemas, the same shape as a table's schemas.
    pub schemas: Vec<Schema>,
    /// The id of the current version of the view.
    pub current_version_id: i64,
    /// The last known versions of the view.
    pub versions: Vec<ViewVersion>,
    /// A list of timestamp and version ID pairs that encodes changes to the
    /// current version of the view.
    pub version_log: Vec<ViewVersionLog>,
    /// A string to string map of view properties.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// One version of a view's definition.
pub struct ViewVersion {
    /// Monotonically increasing id of the version, starting at 1.
    pub version_id: i64,
    /// Timestamp in milliseconds from the unix epoch when the version was created.
    pub timestamp_ms: i64,
    /// ID of the view's schema when the version was created.
    pub schema_id: i32,
    /// The operation that caused this version to be created.
    pub summary: ViewVersionSummary,
    /// The definitions of the view in one or more dialects.
    pub representations: Vec<ViewRepresentation>,
    /// The catalog to resolve unqualified table references against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_catalog: Option<String>,
    /// The namespace to resolve unqualified table references against,
    /// serialized as a list of levels.
    pub default_namespace: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Indicates the view operation that caused a version to be created.
pub struct ViewVersionSummary {
    /// Either "create" or "replace".
    pub operation: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case", tag = "type")]
/// One definition of the view.
pub enum ViewRepresentation {
    #[serde(rename_all = "kebab-case")]
    /// A SQL definition.
    Sql {
        /// The original view definition in SQL.
        sql: String,
        /// The dialect of the `sql` field.
        dialect: String,
    },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A log entry recording when a version became current.
pub struct ViewVersionLog {
    /// The timestamp when the referenced version was made current.
    pub timestamp_ms: i64,
    /// Version id of the view.
    pub version_id: i64,
}

impl ViewMetadata {
    /// Build the initial metadata document for a new view, with a single
    /// version (id 1) carrying one SQL representation.
    pub fn new(
        location: String,
        sql: &str,
        dialect: &str,
        schema: Schema,
        properties: HashMap<String, String>,
        catalog_name: &str,
        namespace: &Namespace,
    ) -> Self {
        let schema = Schema {
            schema_id: 0,
            ..schema
        };
        let now = timestamp_ms();
        let version = ViewVersion {
            version_id: 1,
            timestamp_ms: now,
            schema_id: 0,
            summary: ViewVersionSummary {
                operation: "create".to_string(),
            },
            representations: vec![ViewRepresentation::Sql {
                sql: sql.to_string(),
                dialect: dialect.to_string(),
            }],
            default_catalog: Some(catalog_name.to_string()),
            default_namespace: namespace.levels().to_vec(),
        };
        ViewMetadata {
            format_version: ViewFormatVersion::V1,
            view_uuid: Uuid::new_v4(),
            location,
            schemas: vec![schema],
            current_version_id: 1,
            versions: vec![version],
            version_log: vec![ViewVersionLog {
                timestamp_ms: now,
                version_id: 1,
            }],
            properties,
        }
    }

    /// Get the current version of the view, if the pointer resolves.
    pub fn current_version(&self) -> Option<&ViewVersion> {
        self.versions
            .iter()
            .find(|version| version.version_id == self.current_version_id)
    }

    /// The SQL text of the current version, when it has a SQL representation.
    pub fn sql(&self) -> Option<&str> {
        self.current_version()
            .and_then(|version| version.representations.first())
            .map(|representation| match representation {
                ViewRepresentation::Sql { sql, .. } => sql.as_str(),
            })
    }

    /// The SQL dialect of the current version, when it has a SQL representation.
    pub fn dialect(&self) -> Option<&str> {
        self.current_version()
            .and_then(|version| version.representations.first())
            .map(|representation| match representation {
                ViewRepresentation::Sql { dialect, .. } => dialect.as_str(),
            })
    }
}
