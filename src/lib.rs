//! Per-instance memoization for getter methods.
//!
//! A getter wrapped by [`#[memoize]`](macro@memoize) computes its value once
//! per instance and caches it. The value is recomputed only when the
//! accessor's invalidation key, produced by an optional `#[key(..)]` closure,
//! changes. Distinct instances never share cached state and distinct
//! accessors on the same instance are cached independently. The cache holds
//! instances only weakly: dropping an instance makes its cached state
//! collectible.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use memoget::{AsMemoized, memoize};
//!
//! struct Document {
//!     text: RefCell<String>,
//! }
//!
//! #[memoize]
//! impl Document {
//!     /// Recomputed only when the text changes.
//!     #[key(|this| this.text.borrow().clone())]
//!     fn word_count(&self) -> usize {
//!         self.text.borrow().split_whitespace().count()
//!     }
//! }
//!
//! let doc = Rc::new(Document { text: RefCell::new("hello world".into()) });
//! assert_eq!(doc.memo().word_count(), 2);
//! assert_eq!(doc.memo().word_count(), 2); // Cached.
//!
//! *doc.text.borrow_mut() = "hello".into();
//! assert_eq!(doc.memo().word_count(), 1); // The key changed.
//! ```

mod memo;
mod registry;
mod store;

#[cfg(feature = "testing")]
pub mod testing;

pub use crate::memo::{AsMemoized, Memoize, Memoized};
pub use crate::registry::purge;
#[cfg(feature = "macros")]
pub use memoget_macros::memoize;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    pub use crate::memo::{Accessors, handle};
    pub use crate::registry::memoized;
    pub use crate::store::{FieldId, key_hash};

    /// Assert at compile time that an accessor's value can be cached.
    pub fn assert_memoizable<T: Clone + 'static>() {}

    /// Invoke a key closure on the instance.
    ///
    /// Going through this typed application point pins the closure's
    /// argument type, so unannotated `#[key(..)]` closures infer.
    #[inline]
    pub fn apply_key<T, K, F>(key: F, this: &T) -> K
    where
        K: std::hash::Hash,
        F: FnOnce(&T) -> K,
    {
        key(this)
    }
}
