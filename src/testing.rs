//! Observability hooks for testing memoized accessors.

use std::cell::Cell;

thread_local! {
    /// Whether the last accessor read was served from the cache.
    static LAST_WAS_HIT: Cell<bool> = const { Cell::new(false) };
}

/// Whether the last accessor read was a cache hit.
pub fn last_was_hit() -> bool {
    LAST_WAS_HIT.with(|cell| cell.get())
}

/// The number of instances this thread's registry holds a slot for.
///
/// Includes instances that have been dropped but not yet purged.
pub fn instances() -> usize {
    crate::registry::instances()
}

/// Marks the last read as a cache hit.
pub(crate) fn register_hit() {
    LAST_WAS_HIT.with(|cell| cell.set(true))
}

/// Marks the last read as a cache miss.
pub(crate) fn register_miss() {
    LAST_WAS_HIT.with(|cell| cell.set(false))
}
