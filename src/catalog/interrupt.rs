use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cross-thread stop flag of one catalog connection.
///
/// Clones share the same flag. `interrupt()` and `restart()` may be called
/// from any thread while the owning thread is inside a query; the query
/// notices at its next checkpoint (a progress callback or the next row).
#[derive(Clone, Default)]
pub struct InterruptHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<(Mutex<()>, Condvar)>,
}

impl InterruptHandle {
    /// Sets the stop flag and wakes a thread waiting for a busy store.
    pub fn interrupt(&self) {
        let (lock, cond) = &*self.wake;
        let _guard = lock.lock();
        self.stop.store(true, Ordering::SeqCst);
        cond.notify_all();
    }

    pub fn restart(&self) {
        let (lock, _) = &*self.wake;
        let _guard = lock.lock();
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleeps up to `timeout` while another connection holds the lock.
    /// Returns immediately if the flag is, or becomes, set.
    pub(crate) fn wait_busy(&self, timeout: Duration) {
        let (lock, cond) = &*self.wake;
        let mut guard = lock.lock();
        if !self.is_interrupted() {
            cond.wait_for(&mut guard, timeout);
        }
    }

    /// Closure for `Connection::progress_handler`: returning true aborts
    /// the running statement with SQLITE_INTERRUPT.
    pub(crate) fn progress_hook(&self) -> impl FnMut() -> bool + Send + 'static {
        let stop = Arc::clone(&self.stop);
        move || stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn interrupt_and_restart_toggle_the_flag() {
        let handle = InterruptHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_interrupted());
        clone.interrupt();
        assert!(handle.is_interrupted());
        handle.restart();
        assert!(!clone.is_interrupted());
    }

    #[test]
    fn busy_wait_returns_at_once_when_interrupted() {
        let handle = InterruptHandle::default();
        handle.interrupt();
        let start = Instant::now();
        handle.wait_busy(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn interrupt_wakes_a_busy_waiter() {
        let handle = InterruptHandle::default();
        let waiter = handle.clone();
        let start = Instant::now();
        let thread = thread::spawn(move || waiter.wait_busy(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(50));
        handle.interrupt();
        thread.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
