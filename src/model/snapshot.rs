/*!
Snapshots: the point-in-time data-file sets a table's metadata tracks, and
the named references (branches and tags) that point at them.
*/

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A point-in-time set of data files, reachable through its manifest list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    /// Unique id of the snapshot.
    pub snapshot_id: i64,
    /// Id of the snapshot this one was built on; absent for the first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    /// Commit order of the snapshot within the table.
    pub sequence_number: i64,
    /// Epoch millis at which the snapshot was committed.
    pub timestamp_ms: i64,
    /// Location of the manifest list enumerating the snapshot's files.
    pub manifest_list: String,
    /// What produced the snapshot, plus free-form counters.
    pub summary: SnapshotSummary,
    /// Id of the schema that was current when the snapshot was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<i64>,
}

/// Describes the change a snapshot introduced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// The kind of change, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<SnapshotOperation>,
    /// Free-form counters and annotations (file counts, sizes, engine ids).
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl SnapshotSummary {
    /// A summary recording only the operation kind.
    pub fn for_operation(operation: SnapshotOperation) -> Self {
        SnapshotSummary {
            operation: Some(operation),
            extra: HashMap::new(),
        }
    }
}

/// The kinds of change a snapshot can introduce. Readers use this to skip
/// snapshots irrelevant to them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOperation {
    /// New data files only; nothing removed.
    Append,
    /// Files rewritten without changing table contents, e.g. compaction.
    Replace,
    /// Files added and removed in one logical overwrite.
    Overwrite,
    /// Rows or files logically deleted.
    Delete,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A named pointer to a snapshot, kept in the table metadata's refs map.
pub struct SnapshotReference {
    /// The tagged snapshot or latest snapshot of a branch.
    pub snapshot_id: i64,
    #[serde(flatten)]
    /// The retention policy for the reference.
    pub retention: Retention,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase", tag = "type")]
/// Retention policy field, which differs based on whether the reference is a
/// branch or a tag.
pub enum Retention {
    #[serde(rename_all = "kebab-case")]
    /// A branch reference
    Branch {
        /// A positive number for the minimum number of snapshots to keep in a
        /// branch while expiring snapshots.
        #[serde(skip_serializing_if = "Option::is_none")]
        min_snapshots_to_keep: Option<i32>,
        /// A positive number for the max age of snapshots to keep when expiring,
        /// including the latest snapshot.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_snapshot_age_ms: Option<i64>,
        /// A positive number for the max age of the snapshot reference to
        /// keep while expiring snapshots.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_ref_age_ms: Option<i64>,
    },
    #[serde(rename_all = "kebab-case")]
    /// A tag reference.
    Tag {
        /// A positive number for the max age of the snapshot reference to
        /// keep while expiring snapshots.
        #[serde(skip_serializing_if = "Option::is_none")]
        max_ref_age_ms: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_format() {
        let data = r#"
            {
                "snapshot-id": 3051729675574597004,
                "sequence-number": 1,
                "timestamp-ms": 1515100955770,
                "summary": { "operation": "append", "added-data-files": "4" },
                "manifest-list": "/wh/sales/orders/metadata/snap-1.avro",
                "schema-id": 0
            }
        "#;
        let snapshot: Snapshot = serde_json::from_str(data).unwrap();
        assert_eq!(Some(SnapshotOperation::Append), snapshot.summary.operation);
        assert_eq!(
            Some("4"),
            snapshot.summary.extra.get("added-data-files").map(String::as_str)
        );
        assert_eq!(None, snapshot.parent_snapshot_id);
        assert_eq!(Some(0), snapshot.schema_id);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = Snapshot {
            snapshot_id: 7,
            parent_snapshot_id: Some(6),
            sequence_number: 2,
            timestamp_ms: 1515100955770,
            manifest_list: "/wh/sales/orders/metadata/snap-7.avro".to_string(),
            summary: SnapshotSummary::for_operation(SnapshotOperation::Overwrite),
            schema_id: Some(1),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let reparsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, reparsed);
    }

    #[test]
    fn test_tag_ref() {
        let data = r#"
            {
                "snapshot-id": 3051729675574597004,
                "type" : "tag",
                "max-ref-age-ms": 1515100955770
            }
        "#;
        let reference: SnapshotReference = serde_json::from_str(data).unwrap();
        assert!(matches!(reference.retention, Retention::Tag { .. }));
    }

    #[test]
    fn test_branch_ref() {
        let data = r#"
            {
                "snapshot-id": 3051729675574597004,
                "type" : "branch",
                "min-snapshots-to-keep": 1
            }
        "#;
        let reference: SnapshotReference = serde_json::from_str(data).unwrap();
        assert!(matches!(reference.retention, Retention::Branch { .. }));
    }

    #[test]
    fn test_reference_round_trip() {
        let reference = SnapshotReference {
            snapshot_id: 1,
            retention: Retention::Branch {
                min_snapshots_to_keep: Some(1),
                max_snapshot_age_ms: None,
                max_ref_age_ms: None,
            },
        };
        let json = serde_json::to_string(&reference).unwrap();
        let parsed: SnapshotReference = serde_json::from_str(&json).unwrap();
        assert_eq!(reference, parsed);
    }
}
