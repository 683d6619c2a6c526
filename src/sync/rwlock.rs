//! Write-preferring readers-writer lock.
//!
//! # Responsibilities
//! - Allow any number of concurrent readers when no writer is around
//! - Give an exclusive turn to a writer as soon as it asks for one
//! - Never let a continuous stream of readers starve a waiting writer
//!
//! # Lock State
//! ```text
//! readers_active ≥ 0, writers_waiting ≥ 0, writer_active ∈ {false, true}
//!
//! writer_active == true   ⇒  readers_active == 0
//! readers_active > 0      ⇒  writer_active == false
//! ```
//!
//! A reader may enter only while no writer is active *and* no writer is
//! waiting. A writer may enter only while no writer is active and no reader
//! is inside. Every release broadcasts, so any mix of waiters makes
//! progress; ordering among waiters of the same kind is unspecified.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct LockState {
    readers_active: usize,
    writers_waiting: usize,
    writer_active: bool,
}

/// An async readers-writer lock with writer preference.
///
/// Unlike [`tokio::sync::RwLock`], a pending `write()` blocks all *new*
/// readers while readers already holding the lock drain out. The value is
/// replaced wholesale under the write guard, so readers always observe a
/// fully constructed value.
#[derive(Debug)]
pub struct RwLock<T> {
    state: Mutex<LockState>,
    notify: Notify,
    value: UnsafeCell<T>,
}

// Safety: access to `value` is mediated by the reader/writer protocol above.
// A `&T` is only produced while `readers_active` accounts for the guard, and
// a `&mut T` only while `writer_active` is set, which excludes all readers.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            notify: Notify::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock for shared reading.
    ///
    /// Waits while a writer is active or any writer is waiting.
    pub async fn read(&self) -> ReadGuard<'_, T> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        loop {
            // Register for a wakeup before checking the state, so a release
            // between the check and the await cannot be missed.
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().expect("rwlock state poisoned");
                if !state.writer_active && state.writers_waiting == 0 {
                    state.readers_active += 1;
                    return ReadGuard { lock: self };
                }
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }

    /// Acquire the lock for exclusive writing.
    ///
    /// Registers as a waiting writer immediately, which gates all new
    /// readers, then waits for active readers (or a writer) to drain.
    pub async fn write(&self) -> WriteGuard<'_, T> {
        {
            let mut state = self.state.lock().expect("rwlock state poisoned");
            state.writers_waiting += 1;
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        loop {
            notified.as_mut().enable();
            {
                let mut state = self.state.lock().expect("rwlock state poisoned");
                if !state.writer_active && state.readers_active == 0 {
                    state.writers_waiting -= 1;
                    state.writer_active = true;
                    return WriteGuard { lock: self };
                }
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }
}

/// Shared access to the locked value. Released on drop.
#[derive(Debug)]
pub struct ReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: readers_active > 0 for the lifetime of this guard, which
        // keeps writer_active false and so no `&mut T` exists.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().expect("rwlock state poisoned");
        state.readers_active -= 1;
        if state.readers_active == 0 {
            self.lock.notify.notify_waiters();
        }
    }
}

/// Exclusive access to the locked value. Released on drop.
#[derive(Debug)]
pub struct WriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: writer_active is set, excluding every other guard.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: writer_active is set, excluding every other guard.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().expect("rwlock state poisoned");
        state.writer_active = false;
        self.lock.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn readers_are_concurrent() {
        let lock = Arc::new(RwLock::new(0u64));

        let r1 = lock.read().await;
        // A second reader must be admitted while the first is held.
        let r2 = timeout(Duration::from_millis(100), lock.read())
            .await
            .expect("second reader should not block");
        assert_eq!(*r1, *r2);
    }

    #[tokio::test]
    async fn writer_excludes_readers() {
        let lock = Arc::new(RwLock::new(0u64));

        let w = lock.write().await;
        let blocked = timeout(Duration::from_millis(50), lock.read()).await;
        assert!(blocked.is_err(), "reader must wait for active writer");
        drop(w);

        let r = timeout(Duration::from_millis(100), lock.read())
            .await
            .expect("reader admitted after writer release");
        assert_eq!(*r, 0);
    }

    #[tokio::test]
    async fn waiting_writer_gates_new_readers() {
        let lock = Arc::new(RwLock::new(0u64));

        let r1 = lock.read().await;

        // Writer queues up behind the active reader.
        let writer_lock = lock.clone();
        let writer = tokio::spawn(async move {
            let mut guard = writer_lock.write().await;
            *guard = 7;
        });
        sleep(Duration::from_millis(50)).await;

        // New readers must now wait even though r1 is still inside.
        let blocked = timeout(Duration::from_millis(50), lock.read()).await;
        assert!(blocked.is_err(), "new reader must wait behind queued writer");

        drop(r1);
        writer.await.unwrap();

        let r2 = lock.read().await;
        assert_eq!(*r2, 7, "reader observes the writer's update");
    }

    #[tokio::test]
    async fn writers_are_serialized() {
        let lock = Arc::new(RwLock::new(Vec::<u32>::new()));
        let mut tasks = Vec::new();
        for i in 0..8u32 {
            let lock = lock.clone();
            tasks.push(tokio::spawn(async move {
                let mut guard = lock.write().await;
                guard.push(i);
                sleep(Duration::from_millis(5)).await;
                guard.push(i);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let guard = lock.read().await;
        assert_eq!(guard.len(), 16);
        // Writers never interleave: each writer's two pushes are adjacent.
        for pair in guard.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }
}
