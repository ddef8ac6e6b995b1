//! This example demonstrates per-instance getter memoization: each instance
//! caches its own computed values and recomputes them only when its
//! invalidation key changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use memoget::{AsMemoized, memoize};

fn main() {
    let report = Rc::new(Report {
        body: RefCell::new("four words in here".into()),
        computations: Cell::new(0),
    });

    println!("{}", report.memo().word_count()); // [Miss] Computes.
    println!("{}", report.memo().word_count()); // [Hit] Cached.

    // Change the body. The key changes with it.
    *report.body.borrow_mut() = "now five words in here".into();

    println!("{}", report.memo().word_count()); // [Miss] Recomputes.
    println!("computed {} times", report.computations.get());
}

/// A text with derived statistics.
struct Report {
    body: RefCell<String>,
    computations: Cell<usize>,
}

#[memoize]
impl Report {
    /// Recomputed only when the body changes.
    #[key(|this| this.body.borrow().clone())]
    fn word_count(&self) -> usize {
        self.computations.set(self.computations.get() + 1);
        self.body.borrow().split_whitespace().count()
    }
}
