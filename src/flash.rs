//! Highlight decay for rows picked up by the live tail.
//!
//! Computed at read time from `Row::added_at`; nothing here owns a timer.

use crate::record::Row;

/// Default highlight duration in milliseconds
pub const FLASH_DURATION_MS: i64 = 5_000;

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether `row` is still highlighted at `now_ms`
pub fn is_flashing(row: &Row, now_ms: i64, duration_ms: i64) -> bool {
    match row.added_at {
        Some(added) => now_ms - added < duration_ms,
        None => false,
    }
}

/// Remaining highlight strength, from 1.0 when marked down to 0.0
pub fn flash_intensity(row: &Row, now_ms: i64, duration_ms: i64) -> f32 {
    let Some(added) = row.added_at else {
        return 0.0;
    };
    if duration_ms <= 0 {
        return 0.0;
    }
    let elapsed = (now_ms - added).max(0);
    if elapsed >= duration_ms {
        return 0.0;
    }
    1.0 - elapsed as f32 / duration_ms as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(at: i64) -> Row {
        let mut row = Row::new(1, 0, "x");
        row.added_at = Some(at);
        row
    }

    #[test]
    fn test_unmarked_never_flashes() {
        let row = Row::new(1, 0, "x");
        assert!(!is_flashing(&row, 0, FLASH_DURATION_MS));
        assert_eq!(flash_intensity(&row, 0, FLASH_DURATION_MS), 0.0);
    }

    #[test]
    fn test_decay_window() {
        let row = marked(10_000);
        assert!(is_flashing(&row, 10_000, FLASH_DURATION_MS));
        assert!(is_flashing(&row, 14_999, FLASH_DURATION_MS));
        assert!(!is_flashing(&row, 15_000, FLASH_DURATION_MS));
    }

    #[test]
    fn test_intensity_fades() {
        let row = marked(0);
        assert_eq!(flash_intensity(&row, 0, 1_000), 1.0);
        assert!((flash_intensity(&row, 500, 1_000) - 0.5).abs() < f32::EPSILON);
        assert_eq!(flash_intensity(&row, 1_000, 1_000), 0.0);
        assert_eq!(flash_intensity(&row, 10, 0), 0.0);
    }
}
