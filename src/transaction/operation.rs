/*!
 * Defines the different [TableUpdate] operations applied to a table's
 * metadata to produce the next version.
*/

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::model::metadata::TableMetadata;
use crate::model::partition::PartitionSpec;
use crate::model::schema::Schema;
use crate::model::snapshot::{Retention, Snapshot, SnapshotReference};
use crate::model::sort::SortOrder;
use crate::util::timestamp_ms;

/// The branch name that carries the current snapshot pointer.
pub const MAIN_BRANCH: &str = "main";

/// Id value that refers to the entry added last in the same commit.
const LAST_ADDED: i32 = -1;

/// Whether a snapshot reference is a branch or a tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    /// A branch reference.
    Branch,
    /// A tag reference.
    Tag,
}

/// A declarative mutation applied in order to a copy of the current table
/// metadata. Unknown actions fail deserialization rather than being
/// silently accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TableUpdate {
    /// Set the table UUID.
    #[serde(rename_all = "kebab-case")]
    AssignUuid {
        /// The new UUID.
        uuid: Uuid,
    },
    /// Upgrade the format version of the table.
    #[serde(rename_all = "kebab-case")]
    UpgradeFormatVersion {
        /// The target format version.
        format_version: u8,
    },
    /// Add a schema to the metadata.
    #[serde(rename_all = "kebab-case")]
    AddSchema {
        /// The schema to add.
        schema: Schema,
        /// The highest assigned column id after the addition; derived from
        /// the schema when absent.
        last_column_id: Option<i32>,
    },
    /// Point the current schema at an existing schema id; `-1` refers to the
    /// schema added last in this commit.
    #[serde(rename_all = "kebab-case")]
    SetCurrentSchema {
        /// The schema id to make current.
        schema_id: i32,
    },
    /// Add a partition spec to the metadata.
    #[serde(rename_all = "kebab-case")]
    AddSpec {
        /// The spec to add.
        spec: PartitionSpec,
    },
    /// Point the default spec at an existing spec id; `-1` refers to the
    /// spec added last in this commit.
    #[serde(rename_all = "kebab-case")]
    SetDefaultSpec {
        /// The spec id to make the default.
        spec_id: i32,
    },
    /// Add a sort order to the metadata.
    #[serde(rename_all = "kebab-case")]
    AddSortOrder {
        /// The sort order to add.
        sort_order: SortOrder,
    },
    /// Point the default sort order at an existing order id; `-1` refers to
    /// the order added last in this commit.
    #[serde(rename_all = "kebab-case")]
    SetDefaultSortOrder {
        /// The order id to make the default.
        sort_order_id: i32,
    },
    /// Add a snapshot to the metadata.
    #[serde(rename_all = "kebab-case")]
    AddSnapshot {
        /// The snapshot to add.
        snapshot: Snapshot,
    },
    /// Create or move a named ref to a snapshot. Moving `main` also moves
    /// the current snapshot pointer and extends the snapshot log.
    #[serde(rename_all = "kebab-case")]
    SetSnapshotRef {
        /// Name of the ref.
        ref_name: String,
        /// The snapshot the ref points at.
        snapshot_id: i64,
        /// Whether the ref is a branch or a tag.
        #[serde(rename = "type")]
        ref_type: RefType,
        /// Minimum number of snapshots to keep while expiring; branches only.
        #[serde(skip_serializing_if = "Option::is_none")]
        min_snapshots_to_keep: Option<i32>,
        /// Maximum age of snapshots to keep while expiring; branches only.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_snapshot_age_ms: Option<i64>,
        /// Maximum age of the ref itself.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_ref_age_ms: Option<i64>,
    },
    /// Remove snapshots and everything pointing at them.
    #[serde(rename_all = "kebab-case")]
    RemoveSnapshots {
        /// Ids of the snapshots to remove.
        snapshot_ids: Vec<i64>,
    },
    /// Remove a named ref. Removing `main` clears the current snapshot pointer.
    #[serde(rename_all = "kebab-case")]
    RemoveSnapshotRef {
        /// Name of the ref to remove.
        ref_name: String,
    },
    /// Move the table's base location.
    #[serde(rename_all = "kebab-case")]
    SetLocation {
        /// The new base location.
        location: String,
    },
    /// Set table properties, inserting or overwriting each key.
    #[serde(rename_all = "kebab-case")]
    SetProperties {
        /// The keys to set.
        updates: HashMap<String, String>,
    },
    /// Remove table properties; absent keys are ignored.
    #[serde(rename_all = "kebab-case")]
    RemoveProperties {
        /// The keys to remove.
        removals: Vec<String>,
    },
}

impl TableUpdate {
    /// Apply the update to a metadata copy being prepared for the next
    /// version.
    pub fn apply(&self, metadata: &mut TableMetadata) -> Result<()> {
        match self {
            TableUpdate::AssignUuid { uuid } => {
                metadata.table_uuid = *uuid;
            }
            TableUpdate::UpgradeFormatVersion { format_version } => {
                if *format_version != 2 {
                    return Err(CatalogError::validation(
                        "format-version",
                        format!("cannot upgrade to format version {format_version}"),
                    ));
                }
            }
            TableUpdate::AddSchema {
                schema,
                last_column_id,
            } => {
                if metadata.schema_by_id(schema.schema_id).is_some() {
                    return Err(CatalogError::validation(
                        "schema-id",
                        format!("schema {} already exists", schema.schema_id),
                    ));
                }
                let highest = last_column_id.unwrap_or_else(|| schema.highest_field_id());
                metadata.last_column_id = metadata.last_column_id.max(highest);
                metadata.schemas.push(schema.clone());
            }
            TableUpdate::SetCurrentSchema { schema_id } => {
                let schema_id = if *schema_id == LAST_ADDED {
                    metadata
                        .schemas
                        .last()
                        .map(|schema| schema.schema_id)
                        .ok_or_else(|| {
                            CatalogError::validation("schema-id", "table has no schemas")
                        })?
                } else {
                    *schema_id
                };
                if metadata.schema_by_id(schema_id).is_none() {
                    return Err(CatalogError::validation(
                        "schema-id",
                        format!("schema {schema_id} does not exist"),
                    ));
                }
                metadata.current_schema_id = schema_id;
            }
            TableUpdate::AddSpec { spec } => {
                if metadata
                    .partition_specs
                    .iter()
                    .any(|existing| existing.spec_id == spec.spec_id)
                {
                    return Err(CatalogError::validation(
                        "spec-id",
                        format!("partition spec {} already exists", spec.spec_id),
                    ));
                }
                metadata.last_partition_id = metadata.last_partition_id.max(spec.highest_field_id());
                metadata.partition_specs.push(spec.clone());
            }
            TableUpdate::SetDefaultSpec { spec_id } => {
                let spec_id = if *spec_id == LAST_ADDED {
                    metadata
                        .partition_specs
                        .last()
                        .map(|spec| spec.spec_id)
                        .ok_or_else(|| {
                            CatalogError::validation("spec-id", "table has no partition specs")
                        })?
                } else {
                    *spec_id
                };
                if !metadata
                    .partition_specs
                    .iter()
                    .any(|spec| spec.spec_id == spec_id)
                {
                    return Err(CatalogError::validation(
                        "spec-id",
                        format!("partition spec {spec_id} does not exist"),
                    ));
                }
                metadata.default_spec_id = spec_id;
            }
            TableUpdate::AddSortOrder { sort_order } => {
                if metadata
                    .sort_orders
                    .iter()
                    .any(|existing| existing.order_id == sort_order.order_id)
                {
                    return Err(CatalogError::validation(
                        "order-id",
                        format!("sort order {} already exists", sort_order.order_id),
                    ));
                }
                metadata.sort_orders.push(sort_order.clone());
            }
            TableUpdate::SetDefaultSortOrder { sort_order_id } => {
                let sort_order_id = if *sort_order_id == LAST_ADDED {
                    metadata
                        .sort_orders
                        .last()
                        .map(|order| order.order_id)
                        .ok_or_else(|| {
                            CatalogError::validation("order-id", "table has no sort orders")
                        })?
                } else {
                    *sort_order_id
                };
                if !metadata
                    .sort_orders
                    .iter()
                    .any(|order| order.order_id == sort_order_id)
                {
                    return Err(CatalogError::validation(
                        "order-id",
                        format!("sort order {sort_order_id} does not exist"),
                    ));
                }
                metadata.default_sort_order_id = sort_order_id;
            }
            TableUpdate::AddSnapshot { snapshot } => {
                if metadata.snapshot_by_id(snapshot.snapshot_id).is_some() {
                    return Err(CatalogError::validation(
                        "snapshot-id",
                        format!("snapshot {} already exists", snapshot.snapshot_id),
                    ));
                }
                metadata.last_sequence_number =
                    metadata.last_sequence_number.max(snapshot.sequence_number);
                metadata.snapshots.push(snapshot.clone());
            }
            TableUpdate::SetSnapshotRef {
                ref_name,
                snapshot_id,
                ref_type,
                min_snapshots_to_keep,
                max_snapshot_age_ms,
                max_ref_age_ms,
            } => {
                if metadata.snapshot_by_id(*snapshot_id).is_none() {
                    return Err(CatalogError::validation(
                        "snapshot-id",
                        format!("snapshot {snapshot_id} does not exist"),
                    ));
                }
                let retention = match ref_type {
                    RefType::Branch => Retention::Branch {
                        min_snapshots_to_keep: *min_snapshots_to_keep,
                        max_snapshot_age_ms: *max_snapshot_age_ms,
                        max_ref_age_ms: *max_ref_age_ms,
                    },
                    RefType::Tag => Retention::Tag {
                        max_ref_age_ms: *max_ref_age_ms,
                    },
                };
                metadata.refs.insert(
                    ref_name.clone(),
                    SnapshotReference {
                        snapshot_id: *snapshot_id,
                        retention,
                    },
                );
                if ref_name == MAIN_BRANCH {
                    metadata.current_snapshot_id = Some(*snapshot_id);
                    metadata.snapshot_log.push(crate::model::metadata::SnapshotLog {
                        snapshot_id: *snapshot_id,
                        timestamp_ms: timestamp_ms(),
                    });
                }
            }
            TableUpdate::RemoveSnapshots { snapshot_ids } => {
                metadata
                    .snapshots
                    .retain(|snapshot| !snapshot_ids.contains(&snapshot.snapshot_id));
                metadata
                    .snapshot_log
                    .retain(|entry| !snapshot_ids.contains(&entry.snapshot_id));
                metadata
                    .refs
                    .retain(|_, reference| !snapshot_ids.contains(&reference.snapshot_id));
                if let Some(current) = metadata.current_snapshot_id {
                    if snapshot_ids.contains(&current) {
                        metadata.current_snapshot_id = None;
                    }
                }
            }
            TableUpdate::RemoveSnapshotRef { ref_name } => {
                metadata.refs.remove(ref_name);
                if ref_name == MAIN_BRANCH {
                    metadata.current_snapshot_id = None;
                }
            }
            TableUpdate::SetLocation { location } => {
                metadata.location = location.clone();
            }
            TableUpdate::SetProperties { updates } => {
                metadata.properties.extend(
                    updates
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
            }
            TableUpdate::RemoveProperties { removals } => {
                for key in removals {
                    metadata.properties.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::{PrimitiveType, StructField, Type};
    use crate::model::snapshot::SnapshotSummary;

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

    fn snapshot(snapshot_id: i64) -> Snapshot {
        Snapshot {
            snapshot_id,
            parent_snapshot_id: None,
            sequence_number: 1,
            timestamp_ms: 1515100955770,
            manifest_list: "/wh/sales/orders/metadata/snap-1.avro".to_string(),
            summary: SnapshotSummary {
                operation: None,
                extra: HashMap::new(),
            },
            schema_id: Some(0),
        }
    }

    #[test]
    fn test_deserialize_update() {
        let data = r#"
            {
                "action": "set-properties",
                "updates": { "owner": "alice" }
            }
        "#;
        let update: TableUpdate = serde_json::from_str(data).unwrap();
        assert!(matches!(update, TableUpdate::SetProperties { .. }));
    }

    #[test]
    fn test_unknown_action_fails_loudly() {
        let data = r#"{ "action": "do-something-new" }"#;
        assert!(serde_json::from_str::<TableUpdate>(data).is_err());
    }

    #[test]
    fn test_add_and_set_current_schema() {
        let mut metadata = metadata();
        let next = Schema::from_fields(
            1,
            vec![
                StructField {
                    id: 1,
                    name: "id".to_string(),
                    required: true,
                    field_type: Type::Primitive(PrimitiveType::Long),
                    doc: None,
                },
                StructField {
                    id: 2,
                    name: "amount".to_string(),
                    required: false,
                    field_type: Type::Primitive(PrimitiveType::Double),
                    doc: None,
                },
            ],
        );
        TableUpdate::AddSchema {
            schema: next,
            last_column_id: None,
        }
        .apply(&mut metadata)
        .unwrap();
        assert_eq!(2, metadata.last_column_id);
        assert_eq!(0, metadata.current_schema_id);

        // -1 refers to the schema added last
        TableUpdate::SetCurrentSchema { schema_id: -1 }
            .apply(&mut metadata)
            .unwrap();
        assert_eq!(1, metadata.current_schema_id);
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let mut metadata = metadata();
        let duplicate = metadata.schemas[0].clone();
        assert!(TableUpdate::AddSchema {
            schema: duplicate,
            last_column_id: None,
        }
        .apply(&mut metadata)
        .is_err());
    }

    #[test]
    fn test_snapshot_lineage() {
        let mut metadata = metadata();
        TableUpdate::AddSnapshot {
            snapshot: snapshot(7),
        }
        .apply(&mut metadata)
        .unwrap();
        assert_eq!(1, metadata.last_sequence_number);
        assert_eq!(None, metadata.current_snapshot_id);

        TableUpdate::SetSnapshotRef {
            ref_name: MAIN_BRANCH.to_string(),
            snapshot_id: 7,
            ref_type: RefType::Branch,
            min_snapshots_to_keep: None,
            max_snapshot_age_ms: None,
            max_ref_age_ms: None,
        }
        .apply(&mut metadata)
        .unwrap();
        assert_eq!(Some(7), metadata.current_snapshot_id);
        assert_eq!(1, metadata.snapshot_log.len());
        assert_eq!(7, metadata.refs[MAIN_BRANCH].snapshot_id);

        TableUpdate::RemoveSnapshots {
            snapshot_ids: vec![7],
        }
        .apply(&mut metadata)
        .unwrap();
        assert!(metadata.snapshots.is_empty());
        assert!(metadata.refs.is_empty());
        assert!(metadata.snapshot_log.is_empty());
        assert_eq!(None, metadata.current_snapshot_id);
    }

    #[test]
    fn test_set_ref_to_missing_snapshot_rejected() {
        let mut metadata = metadata();
        assert!(TableUpdate::SetSnapshotRef {
            ref_name: MAIN_BRANCH.to_string(),
            snapshot_id: 9,
            ref_type: RefType::Tag,
            min_snapshots_to_keep: None,
            max_snapshot_age_ms: None,
            max_ref_age_ms: Some(1000),
        }
        .apply(&mut metadata)
        .is_err());
    }

    #[test]
    fn test_properties() {
        let mut metadata = metadata();
        TableUpdate::SetProperties {
            updates: HashMap::from([("owner".to_string(), "alice".to_string())]),
        }
        .apply(&mut metadata)
        .unwrap();
        assert_eq!(Some("alice"), metadata.properties.get("owner").map(String::as_str));

        TableUpdate::RemoveProperties {
            removals: vec!["owner".to_string(), "absent".to_string()],
        }
        .apply(&mut metadata)
        .unwrap();
        assert!(metadata.properties.is_empty());
    }

    #[test]
    fn test_set_location() {
        let mut metadata = metadata();
        TableUpdate::SetLocation {
            location: "/wh/sales/orders_v2".to_string(),
        }
        .apply(&mut metadata)
        .unwrap();
        assert_eq!("/wh/sales/orders_v2", metadata.location);
    }

    #[test]
    fn test_upgrade_format_version() {
        let mut metadata = metadata();
        TableUpdate::UpgradeFormatVersion { format_version: 2 }
            .apply(&mut metadata)
            .unwrap();
        assert!(TableUpdate::UpgradeFormatVersion { format_version: 3 }
            .apply(&mut metadata)
            .is_err());
    }

    #[test]
    fn test_set_snapshot_ref_round_trip() {
        let update = TableUpdate::SetSnapshotRef {
            ref_name: MAIN_BRANCH.to_string(),
            snapshot_id: 7,
            ref_type: RefType::Branch,
            min_snapshots_to_keep: Some(2),
            max_snapshot_age_ms: None,
            max_ref_age_ms: None,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains(r#""action":"set-snapshot-ref""#));
        assert!(json.contains(r#""ref-name":"main""#));
        assert!(json.contains(r#""type":"branch""#));
        let parsed: TableUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(update, parsed);
    }
}
