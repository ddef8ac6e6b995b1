use std::any::{Any, TypeId};
use std::hash::Hash;

use rustc_hash::FxHashMap;
use siphasher::sip128::{Hasher128, SipHasher13};

/// Produce the 128-bit digest under which invalidation keys are compared.
#[inline]
pub fn key_hash<K: Hash>(key: &K) -> u128 {
    let mut state = SipHasher13::new();
    key.hash(&mut state);
    state.finish128().as_u128()
}

/// Identifies one memoized accessor within a class body.
///
/// The `#[memoize]` macro generates a hidden marker type per accessor, so
/// identifiers are stable and cannot collide.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FieldId(TypeId);

impl FieldId {
    /// The identifier of the accessor represented by the marker type `F`.
    #[inline]
    pub fn of<F: 'static>() -> Self {
        Self(TypeId::of::<F>())
    }
}

/// The memoization records of a single instance, one per accessor.
#[derive(Default)]
pub struct FieldStore {
    fields: FxHashMap<FieldId, Record>,
}

impl FieldStore {
    /// The record for `field`, if one was ever written.
    pub fn get(&self, field: FieldId) -> Option<&Record> {
        self.fields.get(&field)
    }

    /// The record for `field`, created empty if absent.
    pub fn record(&mut self, field: FieldId) -> &mut Record {
        self.fields.entry(field).or_default()
    }
}

/// The last observed invalidation key and last computed value for one
/// (instance, accessor) combination.
#[derive(Default)]
pub struct Record {
    /// Digest of the key under which `cached` was written. Meaningless
    /// while `cached` is `None`.
    key: u128,
    /// The cached value, type-erased. `None` until the first successful
    /// computation, so the first read always computes.
    cached: Option<Box<dyn Any>>,
}

impl Record {
    /// Return a clone of the cached value if it is still valid for `key`.
    pub fn lookup<V: Clone + 'static>(&self, key: u128) -> Option<V> {
        let cached = self.cached.as_ref()?;
        (self.key == key)
            .then(|| cached.downcast_ref::<V>().expect("wrong record type").clone())
    }

    /// Overwrite the record after a successful computation.
    pub fn store<V: 'static>(&mut self, key: u128, value: V) {
        self.key = key;
        self.cached = Some(Box::new(value));
    }
}
