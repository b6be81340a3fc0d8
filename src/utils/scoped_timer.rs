use tokio::time::Instant;
use tracing::trace;

use crate::metrics::REQUEST_DURATION_MS;

/// Measures one operation from construction to drop.
///
/// Emits a `timing` trace line and feeds the request latency histogram.
pub(crate) struct ScopedTimer {
    start: Instant,
    name: &'static str,
}

impl ScopedTimer {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        REQUEST_DURATION_MS
            .with_label_values(&[self.name])
            .observe(elapsed.as_secs_f64() * 1000.0);
        trace!(target: "timing", "[TIMING] {} took {} ms", self.name, elapsed.as_millis());
    }
}
