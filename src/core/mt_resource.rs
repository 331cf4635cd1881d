use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

/// A thread-safe, reference-counted voxel resource guarded by a read-write lock.
///
/// `MtResource` is how chunk stores cross the main-thread / worker boundary. The main
/// thread owns the write side (installing generated terrain, applying queued edits) while
/// meshing and accent jobs running on workers hold clones and take short read locks.
///
/// # Examples
/// ```
/// use voxel_forge::core::MtResource;
///
/// let counter = MtResource::new(0);
/// *counter.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
///
/// // A write is refused, not blocked, while a reader is active.
/// let reader = counter.get();
/// assert!(counter.try_get_mut().is_none());
/// drop(reader);
/// assert!(counter.try_get_mut().is_some());
/// ```
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Wraps `resource` in a new shared lock.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read guard, blocking while a writer holds the lock.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap()
    }

    /// Returns a write guard, blocking until every reader has released the lock.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap()
    }

    /// Attempts to take the write lock without blocking.
    ///
    /// Returns `None` when a worker currently holds a read guard. The main thread uses
    /// this to defer voxel edits to a later frame instead of stalling on a mesher.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn try_get_mut(&self) -> Option<RwLockWriteGuard<'_, T>> {
        match self.resource.try_write() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(err)) => panic!("voxel resource poisoned: {err}"),
        }
    }

    /// Returns `true` if both handles point at the same underlying resource.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_the_same_value_across_threads() {
        let shared = MtResource::new(vec![1u16, 2, 3]);
        let clone = shared.clone();
        assert!(shared.ptr_eq(&clone));

        let handle = thread::spawn(move || {
            clone.get_mut().push(4);
        });
        handle.join().unwrap();

        assert_eq!(shared.get().len(), 4);
    }

    #[test]
    fn try_get_mut_refuses_while_read_is_held() {
        let shared = MtResource::new(7u8);
        {
            let _reader = shared.get();
            assert!(shared.try_get_mut().is_none());
        }
        *shared.try_get_mut().unwrap() = 9;
        assert_eq!(*shared.get(), 9);
    }
}
