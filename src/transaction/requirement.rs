/*!
 * Defines the [TableRequirement] preconditions a commit asserts against the
 * current table metadata before any update is applied.
*/

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::model::metadata::TableMetadata;

/// A precondition on the current metadata, evaluated before a commit is
/// permitted. Requirement tags not recognized here deserialize to
/// [TableRequirement::Unknown], which performs a conservative sanity check
/// instead of silently passing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TableRequirement {
    /// The table must not already exist.
    AssertCreate,
    /// The table UUID must match.
    #[serde(rename_all = "kebab-case")]
    AssertTableUuid {
        /// The expected UUID.
        uuid: Uuid,
    },
    /// The named ref must point at the given snapshot, or be absent when
    /// `snapshot-id` is null.
    #[serde(rename_all = "kebab-case")]
    AssertRefSnapshotId {
        /// Name of the ref.
        r#ref: String,
        /// The expected snapshot id, none when the ref must not exist.
        snapshot_id: Option<i64>,
    },
    /// The highest assigned column id must match.
    #[serde(rename_all = "kebab-case")]
    AssertLastAssignedFieldId {
        /// The expected value.
        last_assigned_field_id: i32,
    },
    /// The current schema id must match.
    #[serde(rename_all = "kebab-case")]
    AssertCurrentSchemaId {
        /// The expected value.
        current_schema_id: i32,
    },
    /// The highest assigned partition field id must match.
    #[serde(rename_all = "kebab-case")]
    AssertLastAssignedPartitionId {
        /// The expected value.
        last_assigned_partition_id: i32,
    },
    /// The default partition spec id must match.
    #[serde(rename_all = "kebab-case")]
    AssertDefaultSpecId {
        /// The expected value.
        default_spec_id: i32,
    },
    /// The default sort order id must match.
    #[serde(rename_all = "kebab-case")]
    AssertDefaultSortOrderId {
        /// The expected value.
        default_sort_order_id: i32,
    },
    /// Any requirement tag this implementation does not recognize.
    #[serde(other)]
    Unknown,
}

impl TableRequirement {
    /// The wire tag of the requirement, used in error reports.
    pub fn tag(&self) -> &'static str {
        match self {
            TableRequirement::AssertCreate => "assert-create",
            TableRequirement::AssertTableUuid { .. } => "assert-table-uuid",
            TableRequirement::AssertRefSnapshotId { .. } => "assert-ref-snapshot-id",
            TableRequirement::AssertLastAssignedFieldId { .. } => "assert-last-assigned-field-id",
            TableRequirement::AssertCurrentSchemaId { .. } => "assert-current-schema-id",
            TableRequirement::AssertLastAssignedPartitionId { .. } => {
                "assert-last-assigned-partition-id"
            }
            TableRequirement::AssertDefaultSpecId { .. } => "assert-default-spec-id",
            TableRequirement::AssertDefaultSortOrderId { .. } => "assert-default-sort-order-id",
            TableRequirement::Unknown => "unknown",
        }
    }

    /// Check the requirement against the current metadata.
    pub fn check(&self, metadata: &TableMetadata) -> Result<()> {
        let holds = match self {
            // commits always run against an existing table
            TableRequirement::AssertCreate => false,
            TableRequirement::AssertTableUuid { uuid } => metadata.table_uuid == *uuid,
            TableRequirement::AssertRefSnapshotId { r#ref, snapshot_id } => {
                let current = metadata
                    .refs
                    .get(r#ref)
                    .map(|reference| reference.snapshot_id);
                current == *snapshot_id
            }
            TableRequirement::AssertLastAssignedFieldId {
                last_assigned_field_id,
            } => metadata.last_column_id == *last_assigned_field_id,
            TableRequirement::AssertCurrentSchemaId { current_schema_id } => {
                metadata.current_schema_id == *current_schema_id
            }
            TableRequirement::AssertLastAssignedPartitionId {
                last_assigned_partition_id,
            } => metadata.last_partition_id == *last_assigned_partition_id,
            TableRequirement::AssertDefaultSpecId { default_spec_id } => {
                metadata.default_spec_id == *default_spec_id
            }
            TableRequirement::AssertDefaultSortOrderId {
                default_sort_order_id,
            } => metadata.default_sort_order_id == *default_sort_order_id,
            // a conservative check for requirements this build does not know
            TableRequirement::Unknown => {
                !metadata.location.is_empty() && metadata.current_schema().is_some()
            }
        };
        if holds {
            Ok(())
        } else {
            Err(CatalogError::RequirementFailed(self.tag().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::model::schema::{PrimitiveType, Schema, StructField, Type};
    use crate::model::snapshot::{Retention, SnapshotReference};

    fn metadata() -> TableMetadata {
        TableMetadata::new(
            "/wh/sales/orders".to_string(),
            Schema::from_fields(
                0,
                vec![StructField {
                    id: 1,
                    name: "id".to_string(),
                    required: true,
                    field_type: Type::Primitive(PrimitiveType::Long),
                    doc: None,
                }],
            ),
            HashMap::new(),
        )
    }

    #[test]
    fn test_deserialize_requirement() {
        let data = r#"
            {
                "type": "assert-current-schema-id",
                "current-schema-id": 0
            }
        "#;
        let requirement: TableRequirement = serde_json::from_str(data).unwrap();
        assert_eq!(
            TableRequirement::AssertCurrentSchemaId {
                current_schema_id: 0
            },
            requirement
        );
    }

    #[test]
    fn test_unrecognized_tag_maps_to_unknown() {
        let data = r#"{ "type": "assert-something-new", "value": 7 }"#;
        let requirement: TableRequirement = serde_json::from_str(data).unwrap();
        assert_eq!(TableRequirement::Unknown, requirement);
        // the conservative check passes against sound metadata
        requirement.check(&metadata()).unwrap();
    }

    #[test]
    fn test_assert_table_uuid() {
        let metadata = metadata();
        TableRequirement::AssertTableUuid {
            uuid: metadata.table_uuid,
        }
        .check(&metadata)
        .unwrap();

        let err = TableRequirement::AssertTableUuid {
            uuid: uuid::Uuid::new_v4(),
        }
        .check(&metadata)
        .unwrap_err();
        match err {
            CatalogError::RequirementFailed(tag) => assert_eq!("assert-table-uuid", tag),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_assert_create_fails_against_existing_table() {
        assert!(TableRequirement::AssertCreate.check(&metadata()).is_err());
    }

    #[test]
    fn test_assert_ref_snapshot_id() {
        let mut metadata = metadata();
        metadata.refs.insert(
            "main".to_string(),
            SnapshotReference {
                snapshot_id: 7,
                retention: Retention::Branch {
                    min_snapshots_to_keep: None,
                    max_snapshot_age_ms: None,
                    max_ref_age_ms: None,
                },
            },
        );

        TableRequirement::AssertRefSnapshotId {
            r#ref: "main".to_string(),
            snapshot_id: Some(7),
        }
        .check(&metadata)
        .unwrap();

        // absent ref asserted with null id
        TableRequirement::AssertRefSnapshotId {
            r#ref: "audit".to_string(),
            snapshot_id: None,
        }
        .check(&metadata)
        .unwrap();

        assert!(TableRequirement::AssertRefSnapshotId {
            r#ref: "main".to_string(),
            snapshot_id: Some(8),
        }
        .check(&metadata)
        .is_err());
    }

    #[test]
    fn test_schema_and_spec_assertions() {
        let metadata = metadata();
        TableRequirement::AssertCurrentSchemaId {
            current_schema_id: 0,
        }
        .check(&metadata)
        .unwrap();
        TableRequirement::AssertLastAssignedFieldId {
            last_assigned_field_id: 1,
        }
        .check(&metadata)
        .unwrap();
        TableRequirement::AssertDefaultSpecId { default_spec_id: 0 }
            .check(&metadata)
            .unwrap();
        TableRequirement::AssertDefaultSortOrderId {
            default_sort_order_id: 0,
        }
        .check(&metadata)
        .unwrap();

        assert!(TableRequirement::AssertCurrentSchemaId {
            current_schema_id: 3,
        }
        .check(&metadata)
        .is_err());
    }
}
