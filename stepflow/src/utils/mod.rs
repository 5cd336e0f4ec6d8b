//! Small helpers for ids and durations.

use uuid::Uuid;

/// Generates a time-ordered execution id (UUID v7).
#[must_use]
pub fn new_execution_id() -> Uuid {
    Uuid::now_v7()
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_execution_id_is_v7() {
        let id = new_execution_id();
        assert_eq!(id.get_version_num(), 7);
        assert_ne!(id, new_execution_id());
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_millis(5_000)), 5_000);
        assert_eq!(duration_ms(Duration::from_micros(999)), 0);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
