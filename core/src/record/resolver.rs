//! Process-wide column resolution cache.

use std::{any::TypeId, collections::HashMap, sync::RwLock};

use once_cell::sync::Lazy;

use super::TableRecord;

static COLUMN_CACHE: Lazy<RwLock<HashMap<(TypeId, String), Option<usize>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

#[cfg(test)]
static SCAN_COUNTS: Lazy<RwLock<HashMap<TypeId, usize>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolves a physical column name to its descriptor index on `T`.
///
/// The first resolution per `(type, column)` pair scans the declared
/// descriptor table; every later call is a cache hit. Misses are cached too,
/// so a genuinely absent column never triggers a second scan. The cache is
/// append-only for the life of the process; two callers racing on the same
/// key compute the same index, so the duplicate insert is harmless.
pub fn resolve_column<T: TableRecord>(column: &str) -> Option<usize> {
    let key = (TypeId::of::<T>(), column.to_string());

    if let Some(cached) = COLUMN_CACHE.read().expect("column cache lock poisoned").get(&key) {
        return *cached;
    }

    let resolved = scan::<T>(column);
    COLUMN_CACHE.write().expect("column cache lock poisoned").insert(key, resolved);
    resolved
}

fn scan<T: TableRecord>(column: &str) -> Option<usize> {
    #[cfg(test)]
    {
        *SCAN_COUNTS
            .write()
            .expect("scan count lock poisoned")
            .entry(TypeId::of::<T>())
            .or_insert(0) += 1;
    }

    T::columns().iter().position(|spec| spec.column == column)
}

#[cfg(test)]
pub(crate) fn scan_count<T: TableRecord>() -> usize {
    SCAN_COUNTS
        .read()
        .expect("scan count lock poisoned")
        .get(&TypeId::of::<T>())
        .copied()
        .unwrap_or(0)
}
