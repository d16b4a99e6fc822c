/*!
Sort orders. A table carries a list of [SortOrder]s; each order is an
ordered list of [SortField]s naming a source column, the transform used to
produce the sort values, and where that field's nulls land.
*/

use serde::{Deserialize, Serialize};

use crate::model::partition::Transform;

/// One column's contribution to a sort order. Fields earlier in the order
/// sort before later ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SortField {
    /// Id of the source column in the table schema.
    pub source_id: i32,
    /// Transform producing the values actually sorted on.
    pub transform: Transform,
    /// Ascending or descending.
    pub direction: SortDirection,
    /// Where nulls sort relative to non-null values.
    pub null_order: NullOrder,
}

/// Direction of a sort field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest values first.
    Asc,
    /// Largest values first.
    Desc,
}

/// Placement of null values within a sorted field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NullOrder {
    /// Nulls sort before every non-null value.
    #[serde(rename = "nulls-first")]
    NullsFirst,
    /// Nulls sort after every non-null value.
    #[serde(rename = "nulls-last")]
    NullsLast,
}

/// An identified list of sort fields. Order id 0 with no fields means the
/// table is unsorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SortOrder {
    /// Id of the sort order.
    pub order_id: i32,
    /// The sort fields, applied in order.
    pub fields: Vec<SortField>,
}

impl SortOrder {
    /// The empty sort order new tables start with.
    pub fn unsorted() -> Self {
        SortOrder {
            order_id: 0,
            fields: vec![],
        }
    }
}
