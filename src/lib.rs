#![deny(missing_docs)]
/*!
# ranger-catalog

The table-catalog core of the Ranger data lakehouse: the authoritative,
persisted mapping from logical names (namespaces, tables, views) to on-disk
metadata documents, plus the atomic commit protocol that evolves a table's
metadata version under concurrent writers.

Two state-store backends implement one [catalog::Catalog] contract:

* [catalog::file::FileCatalog] keeps the whole catalog in a single JSON
  document, consistent under concurrent readers and writers through
  content-derived version tags, atomic file replacement and a bounded retry
  loop.
* [catalog::sql::SqlCatalog] keeps the mapping in an embedded SQLite
  database and delegates concurrency to its transactions.

The [model] package holds the Iceberg-shaped metadata documents the catalog
points at; [transaction] holds the requirement and update variants of the
commit protocol; [paths] resolves where everything lives on disk.
*/

pub mod catalog;
pub mod error;
pub mod index;
pub mod metrics;
pub mod model;
pub mod paths;
pub mod table;
pub mod transaction;
pub mod view;
mod util;
