//! Progress reporting for the bulk operations.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A callback observing progress as a fraction in `[0, 1]`.
pub type ProgressCallback<'a> = &'a (dyn Fn(f64) + Sync);

/// Aggregates work units from one or more workers into a monotonically
/// nondecreasing progress fraction in `[0, 1]`.
///
/// Workers report independently and possibly out of order; the sink drops
/// reports that would move backwards, so an observer only ever sees a
/// nondecreasing sequence. [`finish`](Self::finish) reports exactly `1.0`.
pub struct ProgressSink<'a> {
    callback: Option<&'a (dyn Fn(f64) + Sync)>,
    total: u64,
    done: AtomicU64,
    reported: Mutex<f64>,
}

impl<'a> ProgressSink<'a> {
    pub fn new(callback: Option<&'a (dyn Fn(f64) + Sync)>, total: u64) -> Self {
        Self {
            callback,
            total,
            done: AtomicU64::new(0),
            reported: Mutex::new(-1.0),
        }
    }

    /// Records `units` of completed work and reports the new fraction.
    pub fn add(&self, units: u64) {
        let Some(callback) = self.callback else {
            return;
        };
        let done = self.done.fetch_add(units, Ordering::Relaxed) + units;
        let fraction = if self.total == 0 {
            1.0
        } else {
            (done.min(self.total)) as f64 / self.total as f64
        };
        let mut reported = self.reported.lock();
        if fraction > *reported {
            *reported = fraction;
            callback(fraction);
        }
    }

    /// Reports the final `1.0`.
    pub fn finish(&self) {
        let Some(callback) = self.callback else {
            return;
        };
        let mut reported = self.reported.lock();
        *reported = 1.0;
        callback(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_are_nondecreasing_and_end_at_one() {
        let observed = Mutex::new(Vec::new());
        let callback = |fraction: f64| observed.lock().push(fraction);
        let sink = ProgressSink::new(Some(&callback), 4);
        sink.add(1);
        sink.add(2);
        sink.add(1);
        sink.finish();

        let observed = observed.lock();
        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*observed.last().unwrap(), 1.0);
        assert_eq!(observed[0], 0.25);
    }

    #[test]
    fn excess_work_is_clamped() {
        let observed = Mutex::new(Vec::new());
        let callback = |fraction: f64| observed.lock().push(fraction);
        let sink = ProgressSink::new(Some(&callback), 2);
        sink.add(5);
        sink.finish();
        let observed = observed.lock();
        assert!(observed.iter().all(|&fraction| fraction <= 1.0));
        assert_eq!(*observed.last().unwrap(), 1.0);
    }

    #[test]
    fn no_callback_is_a_noop() {
        let sink = ProgressSink::new(None, 10);
        sink.add(3);
        sink.finish();
    }
}
