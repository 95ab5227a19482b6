//! Progress notifications.

/// Receives `(fraction, index)` notifications: `fraction` in `[0, 1]` and
/// the index of the last item processed.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64, index: usize);
}

/// Ignores every notification.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f64, _index: usize) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64, usize) + Send + Sync,
{
    fn report(&self, fraction: f64, index: usize) {
        self(fraction, index)
    }
}

/// Fraction of `total` done after processing item `index`.
pub(crate) fn fraction(index: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (index + 1) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |f: f64, i: usize| seen.lock().unwrap().push((f, i));
        sink.report(0.5, 3);
        ProgressSink::report(&sink, 1.0, 7);
        assert_eq!(*seen.lock().unwrap(), vec![(0.5, 3), (1.0, 7)]);
    }

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(0, 4), 0.25);
        assert_eq!(fraction(3, 4), 1.0);
        assert_eq!(fraction(0, 0), 1.0);
    }
}
