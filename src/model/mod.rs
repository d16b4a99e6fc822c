/*!
Data structures that know how to serialise and deserialise the on-disk
metadata documents: table metadata, view metadata, and their parts.
*/

pub mod metadata;
pub mod partition;
pub mod schema;
pub mod snapshot;
pub mod sort;
pub mod view_metadata;
