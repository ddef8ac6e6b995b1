use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::store::{FieldId, FieldStore};

thread_local! {
    /// The registry of per-instance memoization state shared by all
    /// memoized accessors on this thread.
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Read a memoized accessor, computing and caching its value if the cached
/// one is absent or stale.
pub fn memoized<T, V, E, F>(
    field: FieldId,
    handle: &Rc<T>,
    key: u128,
    compute: F,
) -> Result<V, E>
where
    T: 'static,
    V: Clone + 'static,
    F: FnOnce(&T) -> Result<V, E>,
{
    let id = InstanceId::of(handle);

    // Check if there is a cached value for this instance and accessor.
    let hit = REGISTRY.with(|registry| registry.borrow().lookup::<V>(id, field, key));
    if let Some(value) = hit {
        #[cfg(feature = "testing")]
        crate::testing::register_hit();
        return Ok(value);
    }

    #[cfg(feature = "testing")]
    crate::testing::register_miss();

    // The registry is not borrowed while the computation runs, so the
    // computation may itself read memoized accessors. An error propagates
    // here and leaves the record in its prior state.
    let value = compute(&**handle)?;

    REGISTRY.with(|registry| {
        registry.borrow_mut().insert(id, handle, field, key, value.clone());
    });

    Ok(value)
}

/// Drop the registry entries of instances that are no longer alive.
///
/// The registry also sweeps itself whenever its population crosses a
/// high-water mark, so calling this is only necessary to reclaim memory
/// eagerly. The registry is thread-local, meaning that this only purges
/// this thread's entries.
pub fn purge() {
    REGISTRY.with(|registry| registry.borrow_mut().purge());
}

/// The number of instances the registry currently has a slot for,
/// including dropped instances that have not been purged yet.
#[cfg(feature = "testing")]
pub(crate) fn instances() -> usize {
    REGISTRY.with(|registry| registry.borrow().instances.len())
}

/// Identifies a registered instance by type and allocation address.
///
/// The address stays unambiguous for as long as the slot exists: the
/// slot's weak handle pins the allocation, so it cannot be reused by a new
/// `Rc` until the slot has been purged.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
struct InstanceId {
    ty: TypeId,
    addr: usize,
}

impl InstanceId {
    fn of<T: 'static>(handle: &Rc<T>) -> Self {
        Self {
            ty: TypeId::of::<T>(),
            addr: Rc::as_ptr(handle) as usize,
        }
    }
}

/// Associates instances with their memoization state without keeping them
/// alive.
struct Registry {
    /// Maps from instance identities to their field stores.
    instances: FxHashMap<InstanceId, Slot>,
    /// Population at which the next automatic sweep runs.
    watermark: usize,
}

/// The memoization state of a single instance.
struct Slot {
    /// Watches the instance's liveness.
    handle: Weak<dyn Any>,
    /// One memoization record per accessor.
    store: FieldStore,
}

impl Registry {
    /// Look for a valid cached value for the given instance and accessor.
    fn lookup<V: Clone + 'static>(
        &self,
        id: InstanceId,
        field: FieldId,
        key: u128,
    ) -> Option<V> {
        self.instances.get(&id)?.store.get(field)?.lookup(key)
    }

    /// Write a freshly computed value, creating the instance's slot and the
    /// accessor's record on demand.
    fn insert<T, V>(
        &mut self,
        id: InstanceId,
        handle: &Rc<T>,
        field: FieldId,
        key: u128,
        value: V,
    ) where
        T: 'static,
        V: Clone + 'static,
    {
        let slot = self.instances.entry(id).or_insert_with(|| {
            // Bind the concrete weak first; the unsized coercion happens
            // at the annotated binding.
            let weak = Rc::downgrade(handle);
            let handle: Weak<dyn Any> = weak;
            Slot { handle, store: FieldStore::default() }
        });
        slot.store.record(field).store(key, value);

        if self.instances.len() >= self.watermark {
            self.purge();
            self.watermark = (2 * self.instances.len()).max(16);
        }
    }

    /// Remove the slots of instances that have been dropped.
    fn purge(&mut self) {
        self.instances.retain(|_, slot| slot.handle.strong_count() > 0);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self { instances: FxHashMap::default(), watermark: 16 }
    }
}
