//! Reentrancy accounting for control-plane threads.
//!
//! Every thread that enters control-plane code holds a [`RecursionGuard`]
//! for the duration. While a thread's count is above zero the wired-up
//! fault-injection engine must treat that thread's calls as
//! non-interceptable: the dispatcher's own engine calls would otherwise
//! trip an already-armed failure point and leave the control plane unable
//! to disable anything.
//!
//! The counter is thread-scoped so only control-plane threads are exempt;
//! the slot is an atomic so increments and decrements can never lose an
//! update. The engine sees it only through the read-only
//! [`control_plane_thread`] predicate.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static CONTROL_PLANE_DEPTH: AtomicUsize = const { AtomicUsize::new(0) };
}

/// RAII token marking the current thread as inside the control plane.
///
/// Nested entries stack; the thread stops being a control-plane thread
/// when the outermost guard drops. The guard is deliberately not `Send`:
/// it accounts for the thread that entered, and must be released there.
#[derive(Debug)]
pub struct RecursionGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl RecursionGuard {
    /// Marks the current thread as executing control-plane code.
    #[must_use]
    pub fn enter() -> Self {
        CONTROL_PLANE_DEPTH.with(|depth| depth.fetch_add(1, Ordering::SeqCst));
        Self {
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        CONTROL_PLANE_DEPTH.with(|depth| depth.fetch_sub(1, Ordering::SeqCst));
    }
}

/// Whether the calling thread is currently inside control-plane code.
///
/// Engines consult this before honouring an armed failure point.
#[must_use]
pub fn control_plane_thread() -> bool {
    CONTROL_PLANE_DEPTH.with(|depth| depth.load(Ordering::SeqCst)) > 0
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::{RecursionGuard, control_plane_thread};

    #[test]
    fn guard_marks_and_releases_the_thread() {
        assert!(!control_plane_thread());
        {
            let _outer = RecursionGuard::enter();
            assert!(control_plane_thread());
            {
                let _inner = RecursionGuard::enter();
                assert!(control_plane_thread());
            }
            assert!(control_plane_thread());
        }
        assert!(!control_plane_thread());
    }

    #[test]
    fn guard_does_not_leak_to_other_threads() {
        let _guard = RecursionGuard::enter();
        let other = thread::spawn(control_plane_thread)
            .join()
            .expect("join probe thread");
        assert!(!other);
    }

    #[test]
    fn guard_releases_on_early_exit() {
        fn failing_entry() -> Result<(), ()> {
            let _guard = RecursionGuard::enter();
            Err(())
        }

        assert!(failing_entry().is_err());
        assert!(!control_plane_thread());
    }
}
