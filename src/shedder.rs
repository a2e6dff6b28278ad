//! Advisory load shedding on zip bytes in flight.
//!
//! Callers ask before admitting a zip of a known size; the answer is a shed
//! decision plus a guard that returns the bytes when dropped. The guard
//! decrements exactly once however many exit paths run it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct LoadShedder {
    inner: Option<Arc<Inner>>,
}

#[derive(Debug)]
struct Inner {
    max_bytes: u64,
    in_flight: AtomicU64,
}

impl LoadShedder {
    /// A shedder admitting up to `max_bytes` concurrently. None disables
    /// shedding entirely.
    pub fn new(max_bytes: Option<u64>) -> Self {
        LoadShedder {
            inner: max_bytes.filter(|&m| m > 0).map(|max_bytes| {
                Arc::new(Inner {
                    max_bytes,
                    in_flight: AtomicU64::new(0),
                })
            }),
        }
    }

    /// Decide whether to admit `size` bytes. Returns (shed, guard); when
    /// shed is true the guard is a no-op.
    pub fn decide(&self, size: u64) -> (bool, LoadGuard) {
        let Some(inner) = &self.inner else {
            return (false, LoadGuard { inner: None, size });
        };
        let mut current = inner.in_flight.load(Ordering::Relaxed);
        loop {
            if current + size > inner.max_bytes {
                return (true, LoadGuard { inner: None, size });
            }
            match inner.in_flight.compare_exchange_weak(
                current,
                current + size,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return (
                        false,
                        LoadGuard {
                            inner: Some(Arc::clone(inner)),
                            size,
                        },
                    );
                }
                Err(seen) => current = seen,
            }
        }
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |i| i.in_flight.load(Ordering::Relaxed))
    }

    pub fn enabled(&self) -> bool {
        self.inner.is_some()
    }
}

/// Returns the admitted bytes on drop.
#[derive(Debug)]
pub struct LoadGuard {
    inner: Option<Arc<Inner>>,
    size: u64,
}

impl LoadGuard {
    /// Return the bytes early; dropping later is then a no-op.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.in_flight.fetch_sub(self.size, Ordering::AcqRel);
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_sheds() {
        let shedder = LoadShedder::new(None);
        assert!(!shedder.enabled());
        let (shed, _guard) = shedder.decide(u64::MAX);
        assert!(!shed);
        assert_eq!(shedder.bytes_in_flight(), 0);
    }

    #[test]
    fn test_admit_and_release() {
        let shedder = LoadShedder::new(Some(100));
        let (shed, guard) = shedder.decide(60);
        assert!(!shed);
        assert_eq!(shedder.bytes_in_flight(), 60);

        // Would overrun: shed, counter untouched.
        let (shed2, guard2) = shedder.decide(50);
        assert!(shed2);
        assert_eq!(shedder.bytes_in_flight(), 60);
        drop(guard2);
        assert_eq!(shedder.bytes_in_flight(), 60);

        drop(guard);
        assert_eq!(shedder.bytes_in_flight(), 0);
    }

    #[test]
    fn test_fits_exactly() {
        let shedder = LoadShedder::new(Some(100));
        let (shed, _guard) = shedder.decide(100);
        assert!(!shed);
        assert_eq!(shedder.bytes_in_flight(), 100);
    }

    #[test]
    fn test_release_is_idempotent() {
        let shedder = LoadShedder::new(Some(100));
        let (_, guard) = shedder.decide(40);
        guard.release();
        assert_eq!(shedder.bytes_in_flight(), 0);
        // A second decrement would underflow; release consumed the guard so
        // drop is a no-op.
        let (shed, _g) = shedder.decide(100);
        assert!(!shed);
    }
}
