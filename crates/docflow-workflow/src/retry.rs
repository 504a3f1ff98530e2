//! Per-Activity retry policy (spec §4.6 "Retries").

use std::time::Duration;

/// Max attempts and wall-clock timeout for one Activity dispatch. Named
/// after the `RetryPolicy`/`ActivityOptions` vocabulary common to durable
/// workflow runtimes (`everruns-durable` in the retrieval pack).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self { max_attempts, timeout }
    }

    /// Default policy per processor category (spec §4.6: "max attempts
    /// (default 3-5), timeout (60-300s depending on processor category)").
    /// Signing and notification steps talk to slower external vendors
    /// (e-signature, delivery) so they get a longer timeout and more
    /// attempts than OCR/extraction/classification/validation, which run
    /// against faster, usually in-process or low-latency services.
    pub fn for_category(category: &str) -> Self {
        match category {
            "signing" | "notification" | "storage" => Self::new(5, Duration::from_secs(300)),
            "ocr" | "classification" | "extraction" | "validation" => Self::new(3, Duration::from_secs(60)),
            _ => Self::new(3, Duration::from_secs(120)),
        }
    }
}
