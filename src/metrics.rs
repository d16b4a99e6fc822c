/*!
Operation counters for a catalog, safe to read while writers are active.
*/

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters kept by each catalog backend. All increments are atomic;
/// [CatalogMetrics::snapshot] returns a consistent-enough copy for reporting.
#[derive(Debug, Default)]
pub struct CatalogMetrics {
    tables_created: AtomicU64,
    tables_dropped: AtomicU64,
    views_created: AtomicU64,
    views_dropped: AtomicU64,
    namespaces_created: AtomicU64,
    namespaces_dropped: AtomicU64,
    operation_errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

/// A point-in-time copy of [CatalogMetrics].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Tables created since the catalog was opened.
    pub tables_created: u64,
    /// Tables dropped since the catalog was opened.
    pub tables_dropped: u64,
    /// Views created since the catalog was opened.
    pub views_created: u64,
    /// Views dropped since the catalog was opened.
    pub views_dropped: u64,
    /// Namespaces created since the catalog was opened.
    pub namespaces_created: u64,
    /// Namespaces dropped since the catalog was opened.
    pub namespaces_dropped: u64,
    /// User-visible operation failures, counted once per failure.
    pub operation_errors: u64,
    /// Snapshot-cache hits.
    pub cache_hits: u64,
    /// Snapshot-cache misses.
    pub cache_misses: u64,
}

impl CatalogMetrics {
    pub(crate) fn table_created(&self) {
        self.tables_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn table_dropped(&self) {
        self.tables_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn view_created(&self) {
        self.views_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn view_dropped(&self) {
        self.views_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn namespace_created(&self) {
        self.namespaces_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn namespace_dropped(&self) {
        self.namespaces_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn operation_error(&self) {
        self.operation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tables_created: self.tables_created.load(Ordering::Relaxed),
            tables_dropped: self.tables_dropped.load(Ordering::Relaxed),
            views_created: self.views_created.load(Ordering::Relaxed),
            views_dropped: self.views_dropped.load(Ordering::Relaxed),
            namespaces_created: self.namespaces_created.load(Ordering::Relaxed),
            namespaces_dropped: self.namespaces_dropped.load(Ordering::Relaxed),
            operation_errors: self.operation_errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_copies_counts() {
        let metrics = CatalogMetrics::default();
        metrics.table_created();
        metrics.table_created();
        metrics.namespace_created();
        metrics.operation_error();
        let snapshot = metrics.snapshot();
        assert_eq!(2, snapshot.tables_created);
        assert_eq!(1, snapshot.namespaces_created);
        assert_eq!(1, snapshot.operation_errors);
        assert_eq!(0, snapshot.views_created);

        metrics.table_dropped();
        // the earlier snapshot is a plain copy
        assert_eq!(0, snapshot.tables_dropped);
        assert_eq!(1, metrics.snapshot().tables_dropped);
    }
}
