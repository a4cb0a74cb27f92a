//! Free-list pools for objects reused across requests.
//!
//! A [`Pool`] hands out objects through [`Pooled`] guards. Dropping a guard resets the
//! object and puts it back on the free list, so an object is released exactly once even
//! when the request future holding it is cancelled.
//!
//! Objects are reset on release, never on acquire: whatever sits on the free list is
//! already in its zero state.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An object that can be returned to its zero state for reuse.
pub trait Reusable {
    fn reset(&mut self);
}

/// The default number of idle objects a pool retains.
pub const DEFAULT_MAX_IDLE: usize = 1024;

pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    factory: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Reusable> Pool<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_max_idle(DEFAULT_MAX_IDLE, factory)
    }

    pub fn with_max_idle<F>(max_idle: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self { idle: Mutex::new(Vec::new()), max_idle, factory: Box::new(factory) }
    }

    /// Borrows an object for the lifetime of the returned guard.
    pub fn acquire(&self) -> Pooled<'_, T> {
        Pooled { pool: self, item: Some(self.take()) }
    }

    /// Takes ownership of an idle object, creating one if the free list is empty.
    ///
    /// The caller is responsible for handing it back through [`Pool::put`].
    pub fn take(&self) -> T {
        match self.lock().pop() {
            Some(item) => item,
            None => (self.factory)(),
        }
    }

    /// Resets `item` and returns it to the free list.
    pub fn put(&self, mut item: T) {
        item.reset();
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }

    /// Runs `f` on `item` and puts it back only if `f` succeeds.
    ///
    /// An object whose last use failed may be in any state, so it is dropped instead.
    pub fn recycle_with<R, E>(&self, mut item: T, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let result = f(&mut item);
        if result.is_ok() {
            self.put(item);
        }
        result
    }

    /// Number of objects currently waiting on the free list.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    // the free list is always consistent between operations, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("max_idle", &self.max_idle).finish_non_exhaustive()
    }
}

/// A pooled object on loan; goes back to its pool when dropped.
pub struct Pooled<'a, T: Reusable> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // only `drop` takes the item
        self.item.as_ref().unwrap_or_else(|| unreachable!("pooled item already released"))
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.item.as_mut().unwrap_or_else(|| unreachable!("pooled item already released"))
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

impl<T: Reusable + fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}
