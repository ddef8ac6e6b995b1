//! Run with `cargo test --all-features`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use memoget::{AsMemoized, memoize, purge};
use quickcheck_macros::quickcheck;
use serial_test::serial;

macro_rules! test {
    (miss: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(!memoget::testing::last_was_hit());
    }};
    (hit: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(memoget::testing::last_was_hit());
    }};
}

/// Test that an accessor without a key computes once per instance, even if
/// the backing state changes.
#[test]
#[serial]
fn test_compute_once() {
    let foo = Rc::new(Unkeyed::new("a"));
    test!(miss: foo.memo().text(), "a");

    foo.set("b");
    test!(hit: foo.memo().text(), "a");
    test!(hit: foo.memo().text(), "a");
    assert_eq!(foo.computations.get(), 1);

    // A second instance computes independently, once.
    let bar = Rc::new(Unkeyed::new("x"));
    test!(miss: bar.memo().text(), "x");
    bar.set("y");
    test!(hit: bar.memo().text(), "x");
    assert_eq!(bar.computations.get(), 1);
    assert_eq!(foo.computations.get(), 1);
}

/// Test that a keyed accessor recomputes exactly once per key change.
#[test]
#[serial]
fn test_keyed_recomputation() {
    let foo = Rc::new(Versioned::new("a"));
    test!(miss: foo.memo().text(), "a");
    assert_eq!(foo.computations.get(), 1);

    foo.set("b");
    test!(miss: foo.memo().text(), "b");
    test!(hit: foo.memo().text(), "b");
    test!(hit: foo.memo().text(), "b");
    assert_eq!(foo.computations.get(), 2);

    // Changing back to a previously seen key still recomputes: only the
    // last key is remembered.
    foo.set("a");
    test!(miss: foo.memo().text(), "a");
    assert_eq!(foo.computations.get(), 3);
}

/// Test a composite invalidation key built by an unannotated closure.
#[test]
#[serial]
fn test_composite_key() {
    struct Pair {
        a: Cell<u8>,
        b: Cell<u8>,
        computations: Cell<usize>,
    }

    #[memoize]
    impl Pair {
        #[key(|this| (this.a.get(), this.b.get()))]
        fn concat(&self) -> String {
            self.computations.set(self.computations.get() + 1);
            format!("{}{}", self.a.get(), self.b.get())
        }
    }

    let pair = Rc::new(Pair {
        a: Cell::new(1),
        b: Cell::new(2),
        computations: Cell::new(0),
    });

    test!(miss: pair.memo().concat(), "12");
    test!(hit: pair.memo().concat(), "12");

    pair.b.set(3);
    test!(miss: pair.memo().concat(), "13");
    assert_eq!(pair.computations.get(), 2);
}

/// Test that distinct instances of the same type have independent caches.
#[test]
#[serial]
fn test_instance_independence() {
    let foo = Rc::new(Versioned::new("a"));
    let bar = Rc::new(Versioned::new("x"));

    test!(miss: foo.memo().text(), "a");
    foo.set("b");
    test!(miss: foo.memo().text(), "b");
    assert_eq!(foo.computations.get(), 2);

    test!(miss: bar.memo().text(), "x");
    bar.set("y");
    test!(miss: bar.memo().text(), "y");
    test!(hit: bar.memo().text(), "y");
    assert_eq!(bar.computations.get(), 2);

    // Exercising the second instance did not perturb the first.
    test!(hit: foo.memo().text(), "b");
    assert_eq!(foo.computations.get(), 2);
}

/// Test that accessors on the same instance have independent records.
#[test]
#[serial]
fn test_field_independence() {
    struct Stats {
        numbers: RefCell<Vec<i64>>,
        sums: Cell<usize>,
        minima: Cell<usize>,
    }

    #[memoize]
    impl Stats {
        #[key(|this| this.numbers.borrow().clone())]
        fn sum(&self) -> i64 {
            self.sums.set(self.sums.get() + 1);
            self.numbers.borrow().iter().sum()
        }

        #[key(|this| this.numbers.borrow().clone())]
        fn min(&self) -> Option<i64> {
            self.minima.set(self.minima.get() + 1);
            self.numbers.borrow().iter().copied().min()
        }
    }

    let stats = Rc::new(Stats {
        numbers: RefCell::new(vec![3, 1, 4]),
        sums: Cell::new(0),
        minima: Cell::new(0),
    });

    test!(miss: stats.memo().sum(), 8);
    test!(hit: stats.memo().sum(), 8);
    assert_eq!(stats.sums.get(), 1);
    assert_eq!(stats.minima.get(), 0);

    test!(miss: stats.memo().min(), Some(1));
    test!(hit: stats.memo().sum(), 8);
    assert_eq!((stats.sums.get(), stats.minima.get()), (1, 1));

    stats.numbers.borrow_mut().push(-2);
    test!(miss: stats.memo().sum(), 6);
    test!(miss: stats.memo().min(), Some(-2));
    assert_eq!((stats.sums.get(), stats.minima.get()), (2, 2));
}

/// Test that errors propagate to the caller and are never cached.
#[test]
#[serial]
fn test_error_not_cached() {
    struct Flaky {
        fail: Cell<bool>,
        computations: Cell<usize>,
    }

    #[memoize]
    impl Flaky {
        fn value(&self) -> Result<String, String> {
            self.computations.set(self.computations.get() + 1);
            if self.fail.get() { Err("boom".into()) } else { Ok("fine".into()) }
        }
    }

    let flaky = Rc::new(Flaky { fail: Cell::new(true), computations: Cell::new(0) });
    assert_eq!(flaky.memo().value(), Err("boom".to_string()));
    assert_eq!(flaky.memo().value(), Err("boom".to_string()));
    assert_eq!(flaky.computations.get(), 2);

    // The key is unchanged, yet the next read retries and the success is
    // then cached.
    flaky.fail.set(false);
    test!(miss: flaky.memo().value(), Ok("fine".to_string()));
    test!(hit: flaky.memo().value(), Ok("fine".to_string()));
    assert_eq!(flaky.computations.get(), 3);

    // A later failure does not evict the cached success for the old key.
    flaky.fail.set(true);
    test!(hit: flaky.memo().value(), Ok("fine".to_string()));
    assert_eq!(flaky.computations.get(), 3);
}

/// Test that an accessor can read another instance's memoized accessor.
#[test]
#[serial]
fn test_nested() {
    struct Inner {
        n: Cell<u32>,
    }

    #[memoize]
    impl Inner {
        #[key(|this| this.n.get())]
        fn doubled(&self) -> u32 {
            2 * self.n.get()
        }
    }

    struct Outer {
        inner: Rc<Inner>,
    }

    #[memoize]
    impl Outer {
        #[key(|this| this.inner.n.get())]
        fn quadrupled(&self) -> u32 {
            2 * self.inner.memo().doubled()
        }
    }

    let outer = Rc::new(Outer { inner: Rc::new(Inner { n: Cell::new(3) }) });
    test!(miss: outer.memo().quadrupled(), 12);
    test!(hit: outer.memo().quadrupled(), 12);

    // The inner read was cached along the way.
    test!(hit: outer.inner.memo().doubled(), 6);

    outer.inner.n.set(5);
    test!(miss: outer.memo().quadrupled(), 20);
}

/// Test that dropped instances do not retain memoization state.
#[test]
#[serial]
fn test_reclamation() {
    struct Tiny {
        n: u32,
    }

    #[memoize]
    impl Tiny {
        fn doubled(&self) -> u32 {
            2 * self.n
        }
    }

    purge();
    let baseline = memoget::testing::instances();

    for n in 0..100 {
        let tiny = Rc::new(Tiny { n });
        assert_eq!(tiny.memo().doubled(), 2 * n);
    }

    // Automatic sweeping bounds the registry while instances churn, and an
    // explicit purge empties it.
    assert!(memoget::testing::instances() < baseline + 100);
    purge();
    assert_eq!(memoget::testing::instances(), baseline);

    // A live instance keeps its cached state across a purge.
    let keep = Rc::new(Tiny { n: 7 });
    test!(miss: keep.memo().doubled(), 14);
    purge();
    test!(hit: keep.memo().doubled(), 14);
}

/// An arbitrary interleaving of key changes and reads triggers exactly one
/// computation per run of consecutive equal keys.
#[quickcheck]
fn recomputes_once_per_key_change(keys: Vec<u8>) -> bool {
    let subject = Rc::new(Marked { mark: Cell::new(0), computations: Cell::new(0) });

    let mut expected = 0;
    let mut last = None;
    for &key in &keys {
        subject.mark.set(key);
        subject.memo().current();
        subject.memo().current();
        if last != Some(key) {
            expected += 1;
            last = Some(key);
        }
    }

    subject.computations.get() == expected
}

/// A value with an unkeyed, counted accessor.
struct Unkeyed {
    text: RefCell<String>,
    computations: Cell<usize>,
}

impl Unkeyed {
    fn new(text: &str) -> Self {
        Self { text: RefCell::new(text.into()), computations: Cell::new(0) }
    }

    fn set(&self, text: &str) {
        *self.text.borrow_mut() = text.into();
    }
}

#[memoize]
impl Unkeyed {
    fn text(&self) -> String {
        self.computations.set(self.computations.get() + 1);
        self.text.borrow().clone()
    }
}

/// A value whose accessor is keyed by the backing text itself.
struct Versioned {
    text: RefCell<String>,
    computations: Cell<usize>,
}

impl Versioned {
    fn new(text: &str) -> Self {
        Self { text: RefCell::new(text.into()), computations: Cell::new(0) }
    }

    fn set(&self, text: &str) {
        *self.text.borrow_mut() = text.into();
    }
}

#[memoize]
impl Versioned {
    /// Recomputed when the backing text changes.
    #[key(|this| this.text.borrow().clone())]
    fn text(&self) -> String {
        self.computations.set(self.computations.get() + 1);
        self.text.borrow().clone()
    }
}

/// A value whose accessor is keyed by a settable marker.
struct Marked {
    mark: Cell<u8>,
    computations: Cell<usize>,
}

#[memoize]
impl Marked {
    #[key(|this| this.mark.get())]
    fn current(&self) -> u8 {
        self.computations.set(self.computations.get() + 1);
        self.mark.get()
    }
}
