//! The callback type threaded through every registry entry, and the
//! exactly-once drop guarantee declarations rely on.
//!
//! A subscriber/queryable callback must run zero or more times while
//! declared and be dropped exactly once when undeclared — never called
//! after undeclare starts, never leaked, never dropped twice. `DashMap`'s
//! `remove` already gives us atomic single-ownership removal, so the
//! guarantee falls out of always reaching callbacks through
//! `registry.remove(id)` rather than a separate "is it still there" check
//! followed by a separate removal.

use std::sync::Arc;

/// A user callback invoked with a value of type `T`. Cloning a
/// `Callback` clones the `Arc`, not the closure; the last clone to drop
/// runs the closure's destructors.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

pub fn callback<T, F>(f: F) -> Callback<T>
where
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(f)
}
