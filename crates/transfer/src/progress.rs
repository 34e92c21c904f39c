use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Snapshot of multipart upload progress, emitted after each part.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    /// Part that just finished (1-based).
    pub part_number: u64,
    /// Estimated total parts. Reporting aid only; the transfer loop is
    /// bounded by actual reads, so the final count may differ.
    pub expected_parts: u64,
    /// Bytes transferred so far.
    pub bytes_sent: u64,
    /// Total file size in bytes.
    pub total_bytes: u64,
    /// Windowed transfer speed in bytes per second. Zero until at least two
    /// parts have finished.
    pub bytes_per_second: f64,
    /// Estimated time to transfer the remaining bytes, `None` while the
    /// speed is still zero.
    pub eta: Option<Duration>,
}

impl UploadProgress {
    /// Completed fraction in `0.0..=1.0`, by bytes.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.part_number > 0 { 1.0 } else { 0.0 };
        }
        (self.bytes_sent as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Callback invoked with upload progress.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

struct SpeedSample {
    bytes: u64,
    at: Instant,
}

/// Windowed transfer-speed estimate fed one sample per finished part.
///
/// Old samples age out of the window so the estimate tracks the current
/// network conditions rather than the whole transfer's average.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window: Duration,
}

impl SpeedCalculator {
    /// `window` defaults to 30 s, sized for 100 MiB parts; `max_samples`
    /// defaults to 100.
    pub fn new(window: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                max_samples: max_samples.unwrap_or(100),
                window: window.unwrap_or(Duration::from_secs(30)),
            }),
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push_back(SpeedSample { bytes, at: now });

        if let Some(cutoff) = now.checked_sub(s.window) {
            while s.samples.front().is_some_and(|sample| sample.at < cutoff) {
                s.samples.pop_front();
            }
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average speed over the retained samples, 0.0 with fewer than two.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(first), Some(last)) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.at.duration_since(first.at);
        if s.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }

        let total: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to transfer `remaining_bytes`, `None` at zero speed.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Discards all samples.
    pub fn reset(&self) {
        self.inner.lock().unwrap().samples.clear();
    }
}
