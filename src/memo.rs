use std::fmt::{self, Debug, Formatter};
use std::ops::Deref;
use std::rc::Rc;

/// Reads an instance's memoized accessors.
///
/// Encapsulates a reference to a reference-counted instance. The only
/// methods accessible on `Memoized<T>` are the accessors defined in an impl
/// block for `T` annotated with [`#[memoize]`](macro@crate::memoize).
pub struct Memoized<'a, T>
where
    T: Memoize,
{
    /// The instance whose accessors are read through this handle.
    handle: &'a Rc<T>,
}

// The type `Memoized<T>` automatically dereferences to T's generated
// surface type. This makes the memoized accessors available, but leaves all
// other methods unaccessible.
impl<'a, T> Deref for Memoized<'a, T>
where
    T: Memoize,
{
    type Target = T::Surface<'a>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        T::surface(self)
    }
}

impl<T> Copy for Memoized<'_, T> where T: Memoize {}

impl<T> Clone for Memoized<'_, T>
where
    T: Memoize,
{
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Debug for Memoized<'_, T>
where
    T: Memoize,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad("Memoized(..)")
    }
}

/// A type with memoized accessors.
///
/// This is implemented by types that have an impl block annotated with
/// [`#[memoize]`](macro@crate::memoize).
pub trait Memoize: Accessors {}

/// Provides access to the memoized accessors of a reference-counted
/// instance.
///
/// Instances must be managed by `Rc` so that the cache can watch their
/// liveness without extending it.
pub trait AsMemoized<T: Memoize> {
    /// Obtain a handle through which the memoized accessors are read.
    fn memo(&self) -> Memoized<'_, T>;
}

impl<T: Memoize> AsMemoized<T> for Rc<T> {
    #[inline]
    fn memo(&self) -> Memoized<'_, T> {
        Memoized { handle: self }
    }
}

/// Non-exposed parts of the `Memoize` trait.
pub trait Accessors: Sized + 'static {
    /// The memoized accessor surface of this type.
    type Surface<'a>
    where
        Self: 'a;

    /// Cast a reference from `Memoized` to this type's surface.
    fn surface<'a, 'r>(memoized: &'r Memoized<'a, Self>) -> &'r Self::Surface<'a>
    where
        Self: Memoize;
}

/// Destructure a `Memoized<_>` into the underlying shared handle.
#[inline]
pub fn handle<'a, T: Memoize>(memoized: &Memoized<'a, T>) -> &'a Rc<T> {
    memoized.handle
}
