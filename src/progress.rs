//! Progress reporting for in-flight requests.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events while a workflow waits on the backend.
//!
//! Percentages reach callers through a [`ProgressGauge`], which is what the
//! controllers expose as their displayed progress. The gauge never moves
//! backwards, never leaves `0..=100`, and is pinned to 100 once the request
//! resolves, whatever the transport last reported.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docflow::{ClientConfig, UploadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl UploadProgressCallback for LastPercent {
//!     fn on_progress(&self, _endpoint: &str, percent: u8) {
//!         self.0.store(percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(LastPercent(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Called by the controllers around each request they send.
///
/// Implementations must be `Send + Sync`; the transport may report progress
/// from whichever runtime thread is polling the response body. All methods
/// have default no-op implementations.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once, right before the request is handed to the transport.
    fn on_request_start(&self, endpoint: &str) {
        let _ = endpoint;
    }

    /// Called with the gauge's value each time it advances.
    ///
    /// # Arguments
    /// * `endpoint`: endpoint path of the in-flight request
    /// * `percent`: monotonically non-decreasing, in `0..=100`
    fn on_progress(&self, endpoint: &str, percent: u8) {
        let _ = (endpoint, percent);
    }

    /// Called once the transport has resolved.
    fn on_request_complete(&self, endpoint: &str, success: bool) {
        let _ = (endpoint, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

/// Raw percentage sink handed to [`crate::transport::UploadTransport::send`].
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Displayed progress of one controller.
#[derive(Debug, Default)]
pub struct ProgressGauge {
    percent: AtomicU8,
}

impl ProgressGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current displayed percentage.
    pub fn get(&self) -> u8 {
        self.percent.load(Ordering::SeqCst)
    }

    /// Raise the gauge to `percent` (clamped to 100). Lower values are ignored.
    ///
    /// Returns the new value if the gauge moved.
    pub fn advance(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let prev = self.percent.fetch_max(percent, Ordering::SeqCst);
        (percent > prev).then_some(percent)
    }

    /// Pin the gauge to 100 after the transport resolves.
    pub fn complete(&self) {
        self.percent.store(100, Ordering::SeqCst);
    }

    /// Back to 0 for a new submission or after a reset.
    pub fn reset(&self) {
        self.percent.store(0, Ordering::SeqCst);
    }
}

/// Percentage of `loaded` out of `total`, rounded to nearest.
pub(crate) fn percent_of(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (loaded.saturating_mul(100) + total / 2) / total;
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_request_start("/ocr");
        cb.on_progress("/ocr", 40);
        cb.on_request_complete("/ocr", true);
    }

    #[test]
    fn gauge_is_monotonic() {
        let g = ProgressGauge::new();
        assert_eq!(g.advance(30), Some(30));
        assert_eq!(g.advance(10), None);
        assert_eq!(g.get(), 30);
        assert_eq!(g.advance(30), None);
        assert_eq!(g.advance(75), Some(75));
        assert_eq!(g.get(), 75);
    }

    #[test]
    fn gauge_clamps_to_100() {
        let g = ProgressGauge::new();
        assert_eq!(g.advance(250), Some(100));
        assert_eq!(g.get(), 100);
    }

    #[test]
    fn gauge_complete_and_reset() {
        let g = ProgressGauge::new();
        g.advance(12);
        g.complete();
        assert_eq!(g.get(), 100);
        g.reset();
        assert_eq!(g.get(), 0);
    }

    #[test]
    fn percent_of_rounds_and_guards_zero() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(10, 10), 100);
        assert_eq!(percent_of(20, 10), 100);
    }

    #[test]
    fn arc_dyn_callback_records_events() {
        struct Recorder(Mutex<Vec<String>>);
        impl UploadProgressCallback for Recorder {
            fn on_request_start(&self, endpoint: &str) {
                self.0.lock().unwrap().push(format!("start {endpoint}"));
            }
            fn on_request_complete(&self, endpoint: &str, success: bool) {
                self.0.lock().unwrap().push(format!("done {endpoint} {success}"));
            }
        }

        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        let cb: ProgressCallback = rec.clone();
        cb.on_request_start("/ocr");
        cb.on_progress("/ocr", 50);
        cb.on_request_complete("/ocr", false);
        assert_eq!(
            *rec.0.lock().unwrap(),
            vec!["start /ocr".to_string(), "done /ocr false".to_string()]
        );
    }
}
