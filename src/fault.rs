//! Simulated allocation failure for exercising rollback paths.
//!
//! Compiled in for unit tests and the `fault-injection` feature. Otherwise
//! [`check`] is a no-op.

use crate::error::Result;

#[cfg(any(test, feature = "fault-injection"))]
mod imp {
    use std::thread::{self, ThreadId};

    use parking_lot::{const_mutex, Mutex, MutexGuard};

    use crate::error::{Error, Result};

    /// Held for the lifetime of an [`AllocFailure`], so tests running in
    /// parallel do not arm the switch over each other.
    static SERIAL: Mutex<()> = const_mutex(());
    static ARMED: Mutex<Option<Armed>> = const_mutex(None);

    struct Armed {
        thread: ThreadId,
        skip: usize,
    }

    /// Guard returned by [`force_alloc_failure`]. Dropping it disarms the switch.
    pub struct AllocFailure {
        _serial: MutexGuard<'static, ()>,
    }

    impl Drop for AllocFailure {
        fn drop(&mut self) {
            *ARMED.lock() = None;
        }
    }

    /// Make every allocation on the calling thread fail until the guard drops.
    pub fn force_alloc_failure() -> AllocFailure {
        force_alloc_failure_after(0)
    }

    /// Let `skip` allocations on the calling thread succeed, then fail the rest.
    pub fn force_alloc_failure_after(skip: usize) -> AllocFailure {
        let serial = SERIAL.lock();
        *ARMED.lock() = Some(Armed {
            thread: thread::current().id(),
            skip,
        });
        AllocFailure { _serial: serial }
    }

    pub(crate) fn check(site: &'static str) -> Result<()> {
        let mut armed = ARMED.lock();
        let Some(state) = armed.as_mut() else {
            return Ok(());
        };
        if state.thread != thread::current().id() {
            return Ok(());
        }
        if state.skip > 0 {
            state.skip -= 1;
            return Ok(());
        }

        tracing::error!(fatal = true, site, "allocation failed - not enough memory");
        Err(Error::OutOfMemory(site))
    }
}

#[cfg(any(test, feature = "fault-injection"))]
pub use imp::{force_alloc_failure, force_alloc_failure_after, AllocFailure};

#[cfg(any(test, feature = "fault-injection"))]
pub(crate) fn check(site: &'static str) -> Result<()> {
    imp::check(site)
}

#[cfg(not(any(test, feature = "fault-injection")))]
#[inline(always)]
pub(crate) fn check(_site: &'static str) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_by_default() {
        assert!(check("test").is_ok());
    }

    #[test]
    fn test_countdown_then_fail() {
        let guard = force_alloc_failure_after(2);
        assert!(check("test").is_ok());
        assert!(check("test").is_ok());
        assert!(check("test").is_err());
        assert!(check("test").is_err());
        drop(guard);
        assert!(check("test").is_ok());
    }

    #[test]
    fn test_other_threads_unaffected() {
        let _guard = force_alloc_failure();
        let handle = std::thread::spawn(|| check("other").is_ok());
        assert!(handle.join().unwrap());
        assert!(check("this").is_err());
    }
}
