/*!
Defines the table metadata document. The main struct here is [TableMetadata],
the versioned JSON document each catalog table entry points at.
*/
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

use crate::model::{
    partition::PartitionSpec,
    schema::Schema,
    snapshot::{Snapshot, SnapshotReference},
    sort::SortOrder,
};
use crate::util::timestamp_ms;

/// Format version of a table metadata document. Only version 2 is written.
#[derive(Debug, Serialize_repr, Deserialize_repr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum FormatVersion {
    /// The Iceberg v2 table format.
    V2 = 2,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// The metadata document for a table.
pub struct TableMetadata {
    /// Integer version of the table format.
    pub format_version: FormatVersion,
    /// A UUID that identifies the table
    pub table_uuid: Uuid,
    /// The table's base location
    pub location: String,
    /// The table's highest sequence number
    pub last_sequence_number: i64,
    /// Timestamp in milliseconds from the unix epoch when the table was last updated.
    pub last_updated_ms: i64,
    /// The highest assigned column ID for the table.
    pub last_column_id: i32,
    /// A list of schemas, stored as objects with schema-id.
    pub schemas: Vec<Schema>,
    /// ID of the table's current schema.
    pub current_schema_id: i32,
    /// A list of partition specs, stored as full partition spec objects.
    pub partition_specs: Vec<PartitionSpec>,
    /// ID of the "current" spec that writers should use by default.
    pub default_spec_id: i32,
    /// The highest assigned partition field ID across all partition specs for the table.
    pub last_partition_id: i32,
    /// A string to string map of table properties used to control settings
    /// that affect reading and writing.
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// ID of the current table snapshot; must be the same as the current
    /// ID of the main branch in refs.
    pub current_snapshot_id: Option<i64>,
    /// A list of valid snapshots. Valid snapshots are snapshots for which
    /// all data files exist in the file system.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    /// A list of timestamp and snapshot ID pairs that encodes changes to the
    /// current snapshot for the table. Each time the current-snapshot-id is
    /// changed, a new entry is added with the last-updated-ms and the new
    /// current-snapshot-id.
    #[serde(default)]
    pub snapshot_log: Vec<SnapshotLog>,
    /// A list of timestamp and metadata file location pairs that encodes
    /// the history of metadata files for the table. A new entry is added
    /// each time a new metadata file is committed.
    #[serde(default)]
    pub metadata_log: Vec<MetadataLog>,
    /// A list of sort orders, stored as full sort order objects.
    pub sort_orders: Vec<SortOrder>,
    /// Default sort order id of the table.
    pub default_sort_order_id: i32,
    /// A map of snapshot references. The map keys are the unique snapshot
    /// reference names in the table.
    #[serde(default)]
    pub refs: HashMap<String, SnapshotReference>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Encodes the history of metadata files for the table.
pub struct MetadataLog {
    /// The file for the log.
    pub metadata_file: String,
    /// Time the metadata was created
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A log of when each snapshot was made current.
pub struct SnapshotLog {
    /// Id of the snapshot.
    pub snapshot_id: i64,
    /// Time the snapshot became current
    pub timestamp_ms: i64,
}

impl TableMetadata {
    /// Build the initial metadata document for a new table. The supplied
    /// schema becomes schema 0; the spec and sort order start empty.
    pub fn new(location: String, schema: Schema, properties: HashMap<String, String>) -> Self {
        let schema = Schema {
            schema_id: 0,
            ..schema
        };
        let last_column_id = schema.highest_field_id();
        TableMetadata {
            format_version: FormatVersion::V2,
            table_uuid: Uuid::new_v4(),
            location,
            last_sequence_number: 0,
            last_updated_ms: timestamp_ms(),
            last_column_id,
            schemas: vec![schema],
            current_schema_id: 0,
            partition_specs: vec![PartitionSpec::unpartitioned()],
            default_spec_id: 0,
            last_partition_id: 0,
            properties,
            current_snapshot_id: None,
            snapshots: vec![],
            snapshot_log: vec![],
            metadata_log: vec![],
            sort_orders: vec![SortOrder::unsorted()],
            default_sort_order_id: 0,
            refs: HashMap::new(),
        }
    }

    /// Get the current schema of the table, if the pointer resolves.
    pub fn current_schema(&self) -> Option<&Schema> {
        self.schema_by_id(self.current_schema_id)
    }

    /// Get the schema carrying the given id.
    pub fn schema_by_id(&self, schema_id: i32) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|schema| schema.schema_id == schema_id)
    }

    /// Get the default partition spec for the table.
    pub fn default_spec(&self) -> Option<&PartitionSpec> {
        self.partition_specs
            .iter()
            .find(|spec| spec.spec_id == self.default_spec_id)
    }

    /// Get the current snapshot of the table, if one is set.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.current_snapshot_id
            .and_then(|snapshot_id| self.snapshot_by_id(snapshot_id))
    }

    /// Get the snapshot carrying the given id.
    pub fn snapshot_by_id(&self, snapshot_id: i64) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.snapshot_id == snapshot_id)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::model::schema::{PrimitiveType, StructField, Type};

    fn test_schema() -> Schema {
        Schema::from_fields(
            0,
            vec![StructField {
                id: 1,
                name: "id".to_string(),
                required: true,
                field_type: Type::Primitive(PrimitiveType::Long),
                doc: None,
            }],
        )
    }

    #[test]
    fn test_deserialize_table_metadata() -> Result<()> {
        let data = r#"
            {
                "format-version" : 2,
                "table-uuid": "fb072c92-a02b-11e9-ae9c-1bb7bc9eca94",
                "location": "/wh/sales/orders",
                "last-sequence-number" : 1,
                "last-updated-ms": 1515100955770,
                "last-column-id": 1,
                "schemas": [
                    {
                        "schema-id" : 0,
                        "type" : "struct",
                        "fields" :[
                            {
                                "id": 1,
                                "name": "id",
                                "required": true,
                                "type": "long"
                            }
                        ]
                    }
                ],
                "current-schema-id" : 0,
                "partition-specs": [
                    {
                        "spec-id": 0,
                        "fields": []
                    }
                ],
                "default-spec-id": 0,
                "last-partition-id": 0,
                "properties": {
                    "commit.retry.num-retries": "1"
                },
                "current-snapshot-id": null,
                "metadata-log": [
                    {
                        "metadata-file": "/wh/sales/orders/metadata/v1.metadata.json",
                        "timestamp-ms": 1515100
                    }
                ],
                "sort-orders": [{ "order-id": 0, "fields": [] }],
                "default-sort-order-id": 0
            }
        "#;
        let metadata = serde_json::from_str::<TableMetadata>(data)?;
        assert_eq!(FormatVersion::V2, metadata.format_version);
        assert_eq!(1, metadata.last_column_id);
        assert!(metadata.current_snapshot().is_none());
        assert!(metadata.current_schema().is_some());

        // serialize and deserialize again
        let round_trip: TableMetadata = serde_json::from_str(&serde_json::to_string(&metadata)?)?;
        assert_eq!(metadata, round_trip);
        Ok(())
    }

    #[test]
    fn test_rejects_unsupported_format_version() {
        let data = r#"
            {
                "format-version" : 1,
                "table-uuid": "fb072c92-a02b-11e9-ae9c-1bb7bc9eca94"
            }
        "#;
        assert!(serde_json::from_str::<TableMetadata>(data).is_err());
    }

    #[test]
    fn test_new_table_metadata() {
        let metadata = TableMetadata::new(
            "/wh/sales/orders".to_string(),
            test_schema(),
            HashMap::new(),
        );
        assert_eq!(FormatVersion::V2, metadata.format_version);
        assert_eq!(1, metadata.last_column_id);
        assert_eq!(0, metadata.current_schema_id);
        assert_eq!(Some(0), metadata.default_spec().map(|spec| spec.spec_id));
        assert!(metadata.snapshots.is_empty());
        assert!(metadata.refs.is_empty());
        assert!(metadata.metadata_log.is_empty());
        assert_eq!(None, metadata.current_snapshot_id);
    }
}
