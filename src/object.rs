//! Reference-counted handles for entities shared across component boundaries.
//!
//! Trace IR objects (trace classes, streams, event classes, packets) are shared by
//! every message that refers to them, so they live behind a [`Ref`]. Creating a
//! `Ref` hands the caller the first reference; [`Ref::acquire`] adds one and
//! [`Ref::release`] gives one back. Release consumes the handle, so a reference
//! cannot be returned twice.
//!
//! Borrowing accessors throughout the crate hand out `&Ref<T>` or `&T`; borrowing
//! never changes the count.
//!
//! ```rust
//! use tracegraph::object::{Ref, Release};
//!
//! let first = Ref::new(String::from("stream"));
//! let second = first.acquire();
//! assert_eq!(first.ref_count(), 2);
//!
//! assert_eq!(second.release(), Release::Shared { remaining: 1 });
//! assert_eq!(first.release(), Release::Last);
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Result of releasing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The released reference was the last one; the object was destroyed
    Last,
    /// Other holders remain
    Shared {
        /// References still held elsewhere
        remaining: usize,
    },
}

/// Shared, reference-counted handle.
pub struct Ref<T: ?Sized> {
    inner: Arc<T>,
}

impl<T> Ref<T> {
    /// Create an object owned by the caller (one reference).
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(value) }
    }

    /// Give this reference back. Exactly one of the concurrent releasers of an
    /// object observes [`Release::Last`]; `remaining` is a snapshot otherwise.
    pub fn release(self) -> Release {
        let remaining = Arc::strong_count(&self.inner).saturating_sub(1).max(1);
        match Arc::into_inner(self.inner) {
            Some(value) => {
                drop(value);
                Release::Last
            }
            None => Release::Shared { remaining },
        }
    }
}

impl<T: ?Sized> Ref<T> {
    /// Take an additional reference.
    #[inline]
    pub fn acquire(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }

    /// Number of live references.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles refer to the same object.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T: ?Sized> Clone for Ref<T> {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl<T: ?Sized> Deref for Ref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> AsRef<T> for Ref<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Ref<T> {
    fn from(value: T) -> Self {
        Ref::new(value)
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Ref::ptr_eq(self, other) || *self.inner == *other.inner
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}
