//! Timestamp utilities

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Project a completion time from elapsed time and a progress fraction
///
/// Returns `None` until some progress has been made. Progress is clamped to
/// `(0, 1]`, so a finished fraction yields `now`.
pub fn estimate_completion(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    progress: f64,
) -> Option<DateTime<Utc>> {
    if progress.is_nan() || progress <= 0.0 {
        return None;
    }
    let progress = progress.min(1.0);
    let elapsed_ms = (now - started_at).num_milliseconds().max(0) as f64;
    let remaining_ms = elapsed_ms * (1.0 - progress) / progress;
    Some(now + ChronoDuration::milliseconds(remaining_ms.round() as i64))
}
