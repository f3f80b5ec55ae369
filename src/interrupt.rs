//! Interruption of callers blocked on the slot queue

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Something a blocked waiter is parked on.
pub(crate) trait Wake: Send + Sync {
    /// Wake every waiter. Must take the monitor lock before signalling.
    fn wake_all(&self);
}

#[derive(Default)]
struct InterruptInner {
    flag: AtomicBool,
    parked: Mutex<Option<Weak<dyn Wake>>>,
}

/// A handle used to interrupt a caller blocked in
/// [`ResourcePool::acquire_interruptible`](crate::ResourcePool::acquire_interruptible)
/// or [`SlotQueue::poll_interruptible`](crate::SlotQueue::poll_interruptible).
///
/// The blocked call fails with [`PoolError::Interrupted`](crate::PoolError::Interrupted)
/// and consumes the flag. Clones share the same flag.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Interrupt, PoolError, SlotQueue};
/// use std::thread;
///
/// let queue = SlotQueue::<u32>::new();
/// let interrupt = Interrupt::new();
///
/// let waiter = {
///     let interrupt = interrupt.clone();
///     thread::spawn(move || {
///         matches!(queue.poll_interruptible(None, &interrupt), Err(PoolError::Interrupted))
///     })
/// };
///
/// thread::sleep(std::time::Duration::from_millis(50));
/// interrupt.interrupt();
/// assert!(waiter.join().unwrap());
/// ```
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake the waiter, if one is parked.
    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        let parked = self.inner.parked.lock().clone();
        if let Some(target) = parked.and_then(|weak| weak.upgrade()) {
            target.wake_all();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Lower the flag without delivering it.
    pub fn clear(&self) {
        self.inner.flag.store(false, Ordering::SeqCst);
    }

    /// Consume the flag, returning whether it was raised.
    pub(crate) fn take(&self) -> bool {
        self.inner.flag.swap(false, Ordering::SeqCst)
    }

    // Registration happens under the token lock, before the flag is read.
    pub(crate) fn park(&self, target: Weak<dyn Wake>) {
        *self.inner.parked.lock() = Some(target);
    }

    pub(crate) fn unpark(&self) {
        *self.inner.parked.lock() = None;
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
