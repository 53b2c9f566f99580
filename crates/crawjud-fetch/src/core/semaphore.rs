use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Blocking counting semaphore for OS worker threads.
///
/// Permits are RAII guards, so a permit is returned when the worker finishes
/// or unwinds. The highest number of permits ever held at once is recorded.
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    state: Mutex<State>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct State {
    active: usize,
    peak: usize,
}

impl Semaphore {
    /// A semaphore with `capacity` permits; zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut state = self.lock();
        while state.active >= self.capacity {
            state = self.released.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.active += 1;
        state.peak = state.peak.max(state.active);
        Permit { semaphore: self }
    }

    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.lock();
        if state.active >= self.capacity {
            return None;
        }
        state.active += 1;
        state.peak = state.peak.max(state.active);
        Some(Permit { semaphore: self })
    }

    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Most permits held at the same time since creation.
    pub fn peak(&self) -> usize {
        self.lock().peak
    }

    fn release(&self) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn bounds_concurrent_holders() {
        let semaphore = Semaphore::new(3);
        thread::scope(|s| {
            for _ in 0..12 {
                s.spawn(|| {
                    let _permit = semaphore.acquire();
                    thread::sleep(Duration::from_millis(5));
                });
            }
        });
        assert!(semaphore.peak() <= 3);
        assert!(semaphore.peak() >= 1);
        assert_eq!(semaphore.active(), 0);
    }

    #[test]
    fn permits_return_on_drop() {
        let semaphore = Semaphore::new(1);
        let permit = semaphore.acquire();
        assert!(semaphore.try_acquire().is_none());
        drop(permit);
        assert!(semaphore.try_acquire().is_some());
        assert_eq!(semaphore.peak(), 1);
    }

    #[test]
    fn zero_capacity_still_admits_one() {
        assert_eq!(Semaphore::new(0).capacity(), 1);
    }
}
