/*!
 * Defines the [Transaction] type that stages [TableRequirement]s and
 * [TableUpdate]s and commits them through the catalog in one atomic step.
*/

pub mod operation;
pub mod requirement;

pub use operation::{RefType, TableUpdate, MAIN_BRANCH};
pub use requirement::TableRequirement;

use std::collections::HashMap;

use crate::error::Result;
use crate::model::schema::Schema;
use crate::model::snapshot::Snapshot;
use crate::table::Table;

/// Collects requirements and updates for a table and commits them together.
/// Requirements are checked against the metadata current at commit time; the
/// updates are applied in the order they were staged.
pub struct Transaction<'table> {
    table: &'table mut Table,
    requirements: Vec<TableRequirement>,
    updates: Vec<TableUpdate>,
}

impl<'table> Transaction<'table> {
    /// Create a transaction for the given table.
    pub fn new(table: &'table mut Table) -> Self {
        Transaction {
            table,
            requirements: vec![],
            updates: vec![],
        }
    }

    /// Stage a precondition to check before the updates are applied.
    pub fn require(mut self, requirement: TableRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Require that the table still carries the uuid this handle loaded.
    pub fn require_current_uuid(self) -> Self {
        let uuid = self.table.metadata().table_uuid;
        self.require(TableRequirement::AssertTableUuid { uuid })
    }

    /// Stage an update.
    pub fn update(mut self, update: TableUpdate) -> Self {
        self.updates.push(update);
        self
    }

    /// Stage a schema addition and make it the current schema.
    pub fn update_schema(self, schema: Schema) -> Self {
        self.update(TableUpdate::AddSchema {
            schema,
            last_column_id: None,
        })
        .update(TableUpdate::SetCurrentSchema { schema_id: -1 })
    }

    /// Stage a snapshot addition and move the main branch to it.
    pub fn append_snapshot(self, snapshot: Snapshot) -> Self {
        let snapshot_id = snapshot.snapshot_id;
        self.update(TableUpdate::AddSnapshot { snapshot })
            .update(TableUpdate::SetSnapshotRef {
                ref_name: MAIN_BRANCH.to_string(),
                snapshot_id,
                ref_type: RefType::Branch,
                min_snapshots_to_keep: None,
                max_snapshot_age_ms: None,
                max_ref_age_ms: None,
            })
    }

    /// Stage property updates.
    pub fn set_properties(self, updates: HashMap<String, String>) -> Self {
        self.update(TableUpdate::SetProperties { updates })
    }

    /// Commit the staged updates, replacing the table handle with the fresh
    /// state on success.
    pub async fn commit(self) -> Result<()> {
        let Transaction {
            table,
            requirements,
            updates,
        } = self;
        let catalog = table.catalog();
        let committed = catalog.commit_table(table, requirements, updates).await?;
        *table = committed;
        Ok(())
    }
}
